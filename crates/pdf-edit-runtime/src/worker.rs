use crate::{DocumentId, EditCommand, EditUpdate};
use pdf_edit::{
    EditError, EditorOptions, EditorSession, PageRasterizer, SourceDocument, ThumbnailRenderer,
};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;

struct OpenDocument<R: PageRasterizer> {
    session: EditorSession,
    thumbnails: Arc<ThumbnailRenderer<R>>,
}

struct WorkerState<R: PageRasterizer> {
    documents: HashMap<DocumentId, OpenDocument<R>>,
    next_id: u64,
    rasterizer: R,
    options: EditorOptions,
}

impl<R: PageRasterizer + Clone> WorkerState<R> {
    fn insert(&mut self, session: EditorSession) -> Result<DocumentId, EditError> {
        let thumbnails = ThumbnailRenderer::new(self.rasterizer.clone(), &self.options)?;
        let doc_id = DocumentId(self.next_id);
        self.next_id += 1;
        self.documents.insert(
            doc_id,
            OpenDocument {
                session,
                thumbnails: Arc::new(thumbnails),
            },
        );
        Ok(doc_id)
    }

    fn get(&mut self, doc_id: DocumentId) -> Result<&mut OpenDocument<R>, String> {
        self.documents
            .get_mut(&doc_id)
            .ok_or_else(|| format!("Document not found: {:?}", doc_id))
    }
}

/// Async worker task that owns editing sessions, applies commands and sends
/// updates
pub async fn worker_task<R: PageRasterizer + Clone>(
    rasterizer: R,
    options: EditorOptions,
    mut command_rx: mpsc::UnboundedReceiver<EditCommand>,
    update_tx: mpsc::UnboundedSender<EditUpdate>,
) {
    let mut state = WorkerState {
        documents: HashMap::new(),
        next_id: 0,
        rasterizer,
        options,
    };

    while let Some(cmd) = command_rx.recv().await {
        process_command(cmd, &mut state, &mut command_rx, &update_tx).await;
    }
}

async fn process_command<R: PageRasterizer + Clone>(
    cmd: EditCommand,
    state: &mut WorkerState<R>,
    command_rx: &mut mpsc::UnboundedReceiver<EditCommand>,
    update_tx: &mpsc::UnboundedSender<EditUpdate>,
) {
    let result = match cmd {
        EditCommand::Open { path } => {
            handle_open(EditorSession::open(path, state.options.clone()).await, state, update_tx)
        }
        EditCommand::OpenBytes { bytes } => {
            let loaded = tokio::task::spawn_blocking(move || SourceDocument::from_bytes(bytes))
                .await
                .map_err(EditError::from)
                .and_then(|r| r)
                .map(|source| EditorSession::new(source, state.options.clone()));
            handle_open(loaded, state, update_tx)
        }
        EditCommand::Reorder { doc_id, new_order } => {
            edit_pages(state, doc_id, update_tx, |s| s.reorder(&new_order))
        }
        EditCommand::Delete { doc_id, positions } => {
            edit_pages(state, doc_id, update_tx, |s| s.delete(&positions))
        }
        EditCommand::Rotate {
            doc_id,
            position,
            delta,
        } => edit_pages(state, doc_id, update_tx, |s| s.rotate(position, delta)),
        EditCommand::Duplicate { doc_id, position } => {
            edit_pages(state, doc_id, update_tx, |s| s.duplicate(position).map(|_| ()))
        }
        EditCommand::AddAnnotation { doc_id, annotation } => {
            state.get(doc_id).and_then(|doc| {
                let id = doc
                    .session
                    .add_annotation(annotation)
                    .map_err(|e| e.to_string())?;
                let _ = update_tx.send(EditUpdate::AnnotationAdded { doc_id, id });
                Ok(())
            })
        }
        EditCommand::UpdateAnnotation {
            doc_id,
            id,
            annotation,
        } => state.get(doc_id).and_then(|doc| {
            doc.session
                .update_annotation(id, annotation)
                .map_err(|e| e.to_string())?;
            let _ = update_tx.send(EditUpdate::AnnotationUpdated { doc_id, id });
            Ok(())
        }),
        EditCommand::RemoveAnnotation { doc_id, id } => state.get(doc_id).and_then(|doc| {
            doc.session.remove_annotation(id).map_err(|e| e.to_string())?;
            let _ = update_tx.send(EditUpdate::AnnotationRemoved { doc_id, id });
            Ok(())
        }),
        EditCommand::RenderThumbnails { doc_id } => {
            // Drain any queued render requests, keeping only the most recent
            while let Ok(next_cmd) = command_rx.try_recv() {
                if let EditCommand::RenderThumbnails { doc_id: next_doc } = next_cmd {
                    if next_doc == doc_id {
                        log::debug!("Discarding queued thumbnail render, using newer request");
                        continue;
                    }
                }
                // Apply anything else first so the render reflects it
                Box::pin(process_command(next_cmd, state, command_rx, update_tx)).await;
            }
            handle_render_thumbnails(state, doc_id, update_tx)
        }
        EditCommand::Export {
            doc_id,
            output_path,
        } => handle_export(state, doc_id, output_path, update_tx),
        EditCommand::Close { doc_id } => match state.documents.remove(&doc_id) {
            Some(_) => {
                let _ = update_tx.send(EditUpdate::Closed { doc_id });
                Ok(())
            }
            None => Err(format!("Document not found: {:?}", doc_id)),
        },
    };

    if let Err(message) = result {
        log::warn!("{}", message);
        let _ = update_tx.send(EditUpdate::Error { message });
    }
}

fn handle_open<R: PageRasterizer + Clone>(
    loaded: Result<EditorSession, EditError>,
    state: &mut WorkerState<R>,
    update_tx: &mpsc::UnboundedSender<EditUpdate>,
) -> Result<(), String> {
    let session = loaded.map_err(|e| e.to_string())?;
    let page_count = session.source().page_count();
    let doc_id = state.insert(session).map_err(|e| e.to_string())?;
    log::info!("Opened document {:?} ({} pages)", doc_id, page_count);
    let _ = update_tx.send(EditUpdate::Opened { doc_id, page_count });
    Ok(())
}

fn edit_pages<R: PageRasterizer + Clone>(
    state: &mut WorkerState<R>,
    doc_id: DocumentId,
    update_tx: &mpsc::UnboundedSender<EditUpdate>,
    edit: impl FnOnce(&mut EditorSession) -> Result<(), EditError>,
) -> Result<(), String> {
    let doc = state.get(doc_id)?;
    let generation = doc.session.pages().generation();
    edit(&mut doc.session).map_err(|e| e.to_string())?;
    let _ = update_tx.send(EditUpdate::PagesChanged {
        doc_id,
        pages: doc.session.pages().working_order(),
    });

    // Rotation alone leaves the previews valid
    if doc.session.pages().generation() != generation {
        handle_render_thumbnails(state, doc_id, update_tx)?;
    }
    Ok(())
}

fn handle_render_thumbnails<R: PageRasterizer + Clone>(
    state: &mut WorkerState<R>,
    doc_id: DocumentId,
    update_tx: &mpsc::UnboundedSender<EditUpdate>,
) -> Result<(), String> {
    let doc = state.get(doc_id)?;
    let renderer = Arc::clone(&doc.thumbnails);
    let source = doc.session.source().clone();
    let working_order = doc.session.pages().working_order();

    // Issued now so that any later request supersedes this one
    let ticket = renderer.ticket();
    let update_tx = update_tx.clone();
    tokio::spawn(async move {
        match renderer
            .render_with_ticket(ticket, &source, &working_order)
            .await
        {
            Some(thumbnails) => {
                let _ = update_tx.send(EditUpdate::ThumbnailsRendered { doc_id, thumbnails });
            }
            None => log::debug!("Dropped superseded thumbnails for {:?}", doc_id),
        }
    });
    Ok(())
}

fn handle_export<R: PageRasterizer + Clone>(
    state: &mut WorkerState<R>,
    doc_id: DocumentId,
    output_path: PathBuf,
    update_tx: &mpsc::UnboundedSender<EditUpdate>,
) -> Result<(), String> {
    let doc = state.get(doc_id)?;
    let job = doc.session.begin_export().map_err(|e| e.to_string())?;
    let page_count = job.page_count();

    let update_tx = update_tx.clone();
    tokio::spawn(async move {
        let result = async {
            let bytes = job.run().await?;
            tokio::fs::write(&output_path, bytes).await?;
            Ok::<_, EditError>(())
        }
        .await;

        match result {
            Ok(()) => {
                log::info!("Exported {:?} → {}", doc_id, output_path.display());
                let _ = update_tx.send(EditUpdate::ExportComplete {
                    doc_id,
                    path: output_path,
                    page_count,
                });
            }
            Err(e) => {
                log::warn!("Export of {:?} failed: {}", doc_id, e);
                let _ = update_tx.send(EditUpdate::Error {
                    message: format!("Export failed: {}", e),
                });
            }
        }
    });
    Ok(())
}
