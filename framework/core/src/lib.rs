mod bail;
mod connections;
mod error;
mod shutdown;
mod tls;

pub mod prelude {
    pub use crate::bail::AgentBailError;
    pub use crate::connections::{ConnectionToken, ConnectionTracker};
    pub use crate::error::NetError;
    pub use crate::shutdown::{DelegatedShutdownListener, ShutdownHandle, ShutdownSignalError};
    pub use crate::tls::{CipherSuite, CipherSuites, TlsPolicy, TlsPolicyError, TlsVersion};
}
