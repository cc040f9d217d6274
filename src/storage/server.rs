//! TCP front end for the storage service: one request per connection.

use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;

use super::service::StorageService;
use crate::protocol::{framing, Reason, Reply};

/// Accept connections until `shutdown` fires, serving one request each.
pub async fn serve(
    listener: TcpListener,
    service: Arc<StorageService>,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let addr = listener.local_addr()?;
    tracing::info!(%addr, "storage service listening");

    loop {
        tokio::select! {
            () = shutdown.cancelled() => {
                tracing::info!("storage service shutting down");
                return Ok(());
            }
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, peer)) => {
                        let service = Arc::clone(&service);
                        tokio::spawn(async move {
                            handle_connection(stream, &service).await;
                            tracing::debug!(%peer, "storage connection closed");
                        });
                    }
                    Err(e) => tracing::error!(error = %e, "accept failed"),
                }
            }
        }
    }
}

async fn handle_connection(mut stream: TcpStream, service: &StorageService) {
    let body = match framing::read_frame(&mut stream).await {
        Ok(Some(body)) => body,
        // Disconnected before sending anything, or sent garbage framing.
        Ok(None) => return,
        Err(e) => {
            tracing::warn!(error = %e, "storage request framing error");
            return;
        }
    };

    let reply = match serde_json::from_slice::<serde_json::Value>(&body) {
        Ok(request) => {
            tracing::debug!(?request, "storage request");
            service.dispatch_value(&request).await
        }
        Err(e) => {
            tracing::warn!(error = %e, "undecodable storage request");
            Reply::error(Reason::InvalidJsonFormat)
        }
    };

    if let Err(e) = framing::send_message(&mut stream, &reply).await {
        tracing::warn!(error = %e, "failed to send storage reply");
    }
}
