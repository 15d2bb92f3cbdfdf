//! Auth middleware.

use std::sync::Arc;

use salvo::{http::header::AUTHORIZATION, prelude::*};

use waybill_app::auth::{SERVICE_KEY_HEADER, ServiceCredentials};

use crate::{
    auth::into_status_error,
    extensions::*,
    observability::{AuthOutcome, observe_authentication},
    state::State,
};

#[salvo::handler]
pub(crate) async fn handler(
    req: &mut Request,
    depot: &mut Depot,
    res: &mut Response,
    ctrl: &mut FlowCtrl,
) {
    let state = match depot.obtain_or_500::<Arc<State>>() {
        Ok(state) => Arc::clone(state),
        Err(error) => {
            res.render(error);
            ctrl.skip_rest();

            return;
        }
    };

    let credentials = credentials_from(req);

    match state.authenticator.authenticate(&credentials).await {
        Ok(service) => {
            observe_authentication(AuthOutcome::Admitted);

            tracing::Span::current().record("tenant_uuid", tracing::field::display(service.tenant));

            depot.inject(service);

            ctrl.call_next(req, depot, res).await;
        }
        Err(error) => {
            res.render(into_status_error(error));
            ctrl.skip_rest();
        }
    }
}

fn credentials_from(req: &Request) -> ServiceCredentials {
    let header = |name: &str| {
        req.headers()
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(ToString::to_string)
    };

    ServiceCredentials {
        authorization: header(AUTHORIZATION.as_str()),
        service_key: header(SERVICE_KEY_HEADER),
        origin: Some(req.remote_addr().to_string()).filter(|origin| !origin.is_empty()),
    }
}
