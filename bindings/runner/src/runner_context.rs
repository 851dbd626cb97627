use anyhow::Context;
use gale_net_client::prelude::NetClient;
use gale_runner::prelude::UserValuesConstraint;

#[derive(Default, Debug)]
pub struct NetRunnerContext {
    client: Option<NetClient>,
}

impl UserValuesConstraint for NetRunnerContext {}

impl NetRunnerContext {
    /// The shared network client. Set by [crate::common::configure_net_client].
    pub fn client(&self) -> anyhow::Result<&NetClient> {
        self.client
            .as_ref()
            .context("Network client not configured, call 'configure_net_client' in the scenario 'setup'")
    }

    pub(crate) fn set_client(&mut self, client: NetClient) {
        self.client = Some(client);
    }
}
