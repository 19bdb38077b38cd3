//! Background library scans with streamed progress.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};

use riffshelf_catalog::CatalogStore;
use riffshelf_scan::ScanProgress;

use crate::LIBRARY_CHANNEL_SIZE;
use crate::error::LibraryError;
use crate::session::{LibraryScanner, ScanReport};

/// Message sent through the channel during a background scan.
#[derive(Debug)]
pub enum LibraryEvent {
    /// A directory was visited.
    Progress(ScanProgress),
    /// The run finished; always the last message.
    Complete(Result<ScanReport, LibraryError>),
}

/// Start a library scan on a blocking task.
///
/// Returns a receiver that will receive progress updates and the final result.
pub fn start_library_scan<S>(scanner: Arc<LibraryScanner<S>>) -> mpsc::Receiver<LibraryEvent>
where
    S: CatalogStore + 'static,
{
    let (tx, rx) = mpsc::channel(LIBRARY_CHANNEL_SIZE);

    tokio::spawn(async move {
        let mut progress_rx = scanner.subscribe();

        // Forward walk progress until the run completes
        let tx_progress = tx.clone();
        let progress_task = tokio::spawn(async move {
            loop {
                match progress_rx.recv().await {
                    Ok(progress) => {
                        if tx_progress
                            .send(LibraryEvent::Progress(progress))
                            .await
                            .is_err()
                        {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        let result = tokio::task::spawn_blocking(move || scanner.run())
            .await
            .unwrap_or_else(|e| {
                Err(LibraryError::Task {
                    message: e.to_string(),
                })
            });

        progress_task.abort();
        let _ = tx.send(LibraryEvent::Complete(result)).await;
    });

    rx
}
