mod client;
mod https;
mod tcp;
mod timeout;
mod tls;

pub mod prelude {
    pub use crate::client::NetClient;
    pub use crate::https::{HttpsResponse, MAX_BODY_BYTES};
    pub use crate::tcp::{TcpConnection, LINE_TERMINATOR};
    pub use crate::tls::NegotiatedTls;

    // Error and policy types live in the core crate but are used with every call here.
    pub use gale_core::prelude::{CipherSuites, NetError, TlsPolicy, TlsVersion};
}
