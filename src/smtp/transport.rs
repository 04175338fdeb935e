use futures::future::{BoxFuture, FutureExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

use super::error::SmtpError;

/// Any bidirectional byte stream a session can run over.
pub trait SmtpIo: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T> SmtpIo for T where T: AsyncRead + AsyncWrite + Unpin + Send {}

pub type BoxedIo = Box<dyn SmtpIo>;

/// Opens connections to mail exchangers and upgrades them to TLS.
pub trait Connector: Send + Sync {
    fn connect<'a>(&'a self, host: &'a str, port: u16) -> BoxFuture<'a, Result<BoxedIo, SmtpError>>;

    fn upgrade_tls<'a>(
        &'a self,
        io: BoxedIo,
        host: &'a str,
    ) -> BoxFuture<'a, Result<BoxedIo, SmtpError>>;
}

/// Plain TCP with native-tls STARTTLS upgrades.
///
/// Neither certificates nor host names are verified on the upgraded stream.
pub struct TcpConnector {
    tls: tokio_native_tls::TlsConnector,
}

impl TcpConnector {
    pub fn new() -> Result<Self, SmtpError> {
        let tls = native_tls::TlsConnector::builder()
            .danger_accept_invalid_certs(true)
            .danger_accept_invalid_hostnames(true)
            .build()
            .map_err(|source| SmtpError::Tls { source })?;
        Ok(Self { tls: tls.into() })
    }
}

impl Connector for TcpConnector {
    fn connect<'a>(&'a self, host: &'a str, port: u16) -> BoxFuture<'a, Result<BoxedIo, SmtpError>> {
        async move {
            let stream = TcpStream::connect((host, port))
                .await
                .map_err(|err| SmtpError::connect(host, err))?;
            stream.set_nodelay(true).map_err(SmtpError::io)?;
            Ok(Box::new(stream) as BoxedIo)
        }
        .boxed()
    }

    fn upgrade_tls<'a>(
        &'a self,
        io: BoxedIo,
        host: &'a str,
    ) -> BoxFuture<'a, Result<BoxedIo, SmtpError>> {
        async move {
            let tls = self
                .tls
                .connect(host, io)
                .await
                .map_err(|source| SmtpError::Tls { source })?;
            Ok(Box::new(tls) as BoxedIo)
        }
        .boxed()
    }
}
