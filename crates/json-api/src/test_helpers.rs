//! Test helpers.

use std::sync::Arc;

use salvo::{affix_state::inject, prelude::*};

use waybill_app::{
    auth::{AuthenticatedService, CredentialKind, MockServiceAuthenticator, ServiceScopes},
    domain::{fleet::MockFleetService, tenants::TenantUuid},
};

use crate::state::State;

/// A callback caller for `tenant` with every scope.
pub(crate) fn full_access(tenant: TenantUuid) -> AuthenticatedService {
    AuthenticatedService {
        tenant,
        correlation: None,
        kind: CredentialKind::CallbackToken,
        scopes: ServiceScopes::Full,
    }
}

pub(crate) fn strict_authenticator_mock() -> MockServiceAuthenticator {
    let mut authenticator = MockServiceAuthenticator::new();

    authenticator.expect_authenticate().never();

    authenticator
}

pub(crate) fn strict_fleet_mock() -> MockFleetService {
    let mut fleet = MockFleetService::new();

    fleet.expect_create_truck().never();
    fleet.expect_create_driver().never();
    fleet.expect_list_trucks().never();
    fleet.expect_reassign_driver().never();
    fleet.expect_history_for_driver().never();

    fleet
}

pub(crate) fn state_with_authenticator(authenticator: MockServiceAuthenticator) -> Arc<State> {
    Arc::new(State::new(
        Arc::new(authenticator),
        Arc::new(strict_fleet_mock()),
    ))
}

/// Serve `route` as if the auth middleware had admitted `service`.
pub(crate) fn fleet_service(
    fleet: MockFleetService,
    service: AuthenticatedService,
    route: Router,
) -> Service {
    let state = Arc::new(State::new(
        Arc::new(strict_authenticator_mock()),
        Arc::new(fleet),
    ));

    Service::new(
        Router::new()
            .hoop(inject(state))
            .hoop(inject(service))
            .push(route),
    )
}
