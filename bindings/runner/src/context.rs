use gale_net_client::prelude::TcpConnection;
use gale_runner::prelude::UserValuesConstraint;

#[derive(Debug, Default)]
pub struct DefaultScenarioValues {}

impl UserValuesConstraint for DefaultScenarioValues {}

#[derive(Debug, Default)]
pub struct NetAgentContext<SV: UserValuesConstraint = DefaultScenarioValues> {
    /// The virtual user's TCP connection, if one is open.
    pub tcp: Option<TcpConnection>,
    /// Values specific to a scenario, for state that the shared helpers don't track.
    pub scenario_values: SV,
}

impl<SV: UserValuesConstraint> UserValuesConstraint for NetAgentContext<SV> {}
