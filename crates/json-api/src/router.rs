//! App Router

use salvo::Router;

use crate::{auth, healthcheck, observability::metrics_handler, service};

pub(crate) fn app_router() -> Router {
    Router::new()
        .push(Router::with_path("healthcheck").get(healthcheck::handler))
        .push(Router::with_path("metrics").get(metrics_handler))
        .push(
            Router::with_path("service")
                .hoop(auth::middleware::handler)
                .push(Router::with_path("context").get(service::context::handler))
                .push(Router::with_path("trucks").get(service::trucks::handler))
                .push(
                    Router::with_path("drivers/{driver}/truck").put(service::drivers::handler),
                ),
        )
}

#[cfg(test)]
mod tests {
    use salvo::{
        affix_state::inject,
        prelude::*,
        test::{ResponseExt, TestClient},
    };
    use testresult::TestResult;
    use waybill_app::auth::{AuthError, AuthFailure, MockServiceAuthenticator};

    use crate::test_helpers::{state_with_authenticator, strict_authenticator_mock};

    use super::*;

    fn make_service(authenticator: MockServiceAuthenticator) -> Service {
        Service::new(
            Router::new()
                .hoop(inject(state_with_authenticator(authenticator)))
                .push(app_router()),
        )
    }

    #[tokio::test]
    async fn healthcheck_needs_no_credentials() -> TestResult {
        let mut res = TestClient::get("http://example.com/healthcheck")
            .send(&make_service(strict_authenticator_mock()))
            .await;

        assert_eq!(res.status_code, Some(StatusCode::OK));
        assert!(res.take_string().await?.contains("ok"));

        Ok(())
    }

    #[tokio::test]
    async fn service_routes_require_credentials() -> TestResult {
        let mut authenticator = MockServiceAuthenticator::new();

        authenticator
            .expect_authenticate()
            .once()
            .return_once(|_| Err(AuthError::Unauthenticated(AuthFailure::MissingCredentials)));

        let res = TestClient::get("http://example.com/service/trucks")
            .send(&make_service(authenticator))
            .await;

        assert_eq!(res.status_code, Some(StatusCode::UNAUTHORIZED));

        Ok(())
    }
}
