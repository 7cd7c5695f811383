// Copyright (c) 2025-present Cesar Saguier Antebi
// All Rights Reserved.
//
// This file is part of the Categorizer project.
// Licensed under the Business Source License 1.1 (BUSL-1.1).
// See LICENSE file in the project root for full license information.
//
// Commercial use requires express written consent and royalty agreements.
// Contact: Cesar Saguier Antebi

//! TCP front tier: one call per connection, decoded by the streaming
//! ingestion decoder and relayed through the router.

use std::future::Future;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use network::{
    ingest_request, message_stream, write_message, FrameError, IngestError, IngestLimits,
    IngestedRequest, Reply, StreamFrame, FRAME_OVERHEAD_BYTES, MULTI_TAG_UNSUPPORTED,
};
use replication::MutationReply;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, field, info, info_span, warn, Instrument, Span};
use uuid::Uuid;

use crate::router::{RouteError, Router};

const MAX_REPLY_BYTES: u64 = 64 * 1024;
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

pub struct FrontTierServer {
    router: Arc<Router>,
    limits: IngestLimits,
}

impl FrontTierServer {
    pub fn new(router: Arc<Router>, limits: IngestLimits) -> Self {
        Self { router, limits }
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Accepts calls until `shutdown` resolves. In-flight calls keep running on
    /// their own tasks.
    pub async fn serve<F>(self: Arc<Self>, listener: TcpListener, shutdown: F) -> io::Result<()>
    where
        F: Future<Output = ()>,
    {
        let local_addr = listener.local_addr()?;
        info!(%local_addr, "front tier listening");
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!(%local_addr, "front tier stopping");
                    return Ok(());
                }
                accepted = listener.accept() => {
                    let (socket, peer) = match accepted {
                        Ok(accepted) => accepted,
                        Err(err) => {
                            warn!(error = %err, "accept failed");
                            continue;
                        }
                    };
                    let server = self.clone();
                    let span = info_span!(
                        "call",
                        request_id = %Uuid::new_v4(),
                        %peer,
                        op = field::Empty
                    );
                    tokio::spawn(
                        async move {
                            if let Err(err) = server.handle_connection(socket).await {
                                warn!(error = %err, "call ended with transport error");
                            }
                        }
                        .instrument(span),
                    );
                }
            }
        }
    }

    pub async fn handle_connection(&self, socket: TcpStream) -> Result<(), FrameError> {
        let (reader, mut writer) = socket.into_split();
        let max_frame = self.limits.max_chunk_bytes as u64 + FRAME_OVERHEAD_BYTES;
        let mut frames = Box::pin(message_stream::<StreamFrame, _>(reader, max_frame));

        // requests answered before their payload was read leave frames behind
        let (reply, unread) = match ingest_request(&mut frames, &self.limits).await {
            Ok(request) => (self.dispatch(request).await, false),
            Err(IngestError::UnsupportedMultiTag(count)) => {
                debug!(tags = count, "answering multi-tag classification");
                let reply = Reply::Photo {
                    desc: MULTI_TAG_UNSUPPORTED.to_string(),
                };
                (reply, true)
            }
            Err(err) => {
                warn!(error = %err, code = %err.code(), "request cancelled");
                let reply = Reply::Cancelled {
                    code: err.code(),
                    desc: err.to_string(),
                };
                (reply, true)
            }
        };
        write_message(&mut writer, &reply, MAX_REPLY_BYTES).await?;

        if unread {
            // read out the rest of the upload so closing does not reset the reply away
            let drain = async { while frames.next().await.is_some() {} };
            if tokio::time::timeout(DRAIN_TIMEOUT, drain).await.is_err() {
                debug!("client kept sending after the reply");
            }
        }
        Ok(())
    }

    pub async fn dispatch(&self, request: IngestedRequest) -> Reply {
        Span::current().record("op", request.operation());
        match request {
            IngestedRequest::Install { tag, sizes, bytes } => {
                info!(tag, bytes = bytes.len(), "install");
                mutation_reply(self.router.install(tag, sizes, bytes).await)
            }
            IngestedRequest::Remove { tag } => {
                info!(tag, "remove");
                mutation_reply(self.router.remove(tag).await)
            }
            IngestedRequest::Classify(photo) => {
                let tag = photo.tag;
                match self.router.classify(photo).await {
                    Ok(guess) => {
                        info!(tag, label = %guess.label, confidence = guess.confidence, "classified");
                        Reply::Photo { desc: guess.label }
                    }
                    Err(err) => Reply::Cancelled {
                        code: err.code(),
                        desc: err.to_string(),
                    },
                }
            }
        }
    }
}

fn mutation_reply(result: Result<MutationReply, RouteError>) -> Reply {
    match result {
        Ok(reply) => Reply::Model {
            code: reply.code,
            desc: reply.desc,
        },
        Err(err) => Reply::Model {
            code: err.code(),
            desc: err.to_string(),
        },
    }
}
