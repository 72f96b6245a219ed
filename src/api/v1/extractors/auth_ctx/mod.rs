/*!
 * Authentication context extractor
 *
 * Responsibility:
 * - 認証済みリクエストのコンテキスト（AuthCtx）を handler に提供する
 * - 型そのものは services::auth::identity に置き、ここは axum との接点だけを持つ
 *
 * Public API:
 * - AuthCtx
 * - AuthCtxExtractor
 */

mod core;

pub use crate::services::auth::AuthCtx;
pub use core::AuthCtxExtractor;
