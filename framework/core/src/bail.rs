/// Return this error from a virtual user's behaviour function to indicate that the virtual user
/// is bailing.
///
/// This should be used when a virtual user hits an error that is fatal to it but not to the run.
/// For example, if the target refuses every connection then the virtual user may bail while the
/// others keep going.
#[derive(derive_more::Error, derive_more::Display, Debug)]
pub struct AgentBailError {
    msg: String,
}

impl AgentBailError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self { msg: msg.into() }
    }
}

impl Default for AgentBailError {
    fn default() -> Self {
        Self {
            msg: "Virtual user is bailing".to_string(),
        }
    }
}
