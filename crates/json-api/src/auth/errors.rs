//! Auth error responses.

use salvo::http::StatusError;
use tracing::{error, warn};

use waybill_app::auth::AuthError;

use crate::observability::{AuthOutcome, observe_authentication};

/// Uniform body for every authentication failure, so callers cannot tell a
/// bad token from an unknown key.
pub(crate) const UNAUTHENTICATED_BRIEF: &str = "Invalid or missing service credentials";

pub(crate) fn into_status_error(error: AuthError) -> StatusError {
    match error {
        AuthError::Unauthenticated(failure) => {
            warn!(reason = ?failure, "service credentials rejected");
            observe_authentication(AuthOutcome::Rejected);

            StatusError::unauthorized().brief(UNAUTHENTICATED_BRIEF)
        }
        AuthError::Forbidden(scope) => {
            warn!(scope = %scope, "service credential lacks scope");

            StatusError::forbidden().brief(format!("Missing required scope `{scope}`"))
        }
        AuthError::Store(source) => {
            error!("failed to check service credentials: {source}");
            observe_authentication(AuthOutcome::Failed);

            StatusError::internal_server_error()
        }
    }
}
