//! In-process transport over tokio unbounded channels
//!
//! Every rank has one inbox. Sends never block: the channel buffers them, so
//! a worker that runs ahead can send its next generation before a slower
//! neighbor has posted the matching receives. Messages that arrive before
//! they are wanted are stashed per `(source, tag)`.

use crate::comm::{CellMessage, Envelope, RecvRequest, Request, SendRequest, Transport};
use crate::core::error::{LifeError, Result};
use crate::core::types::{Rank, Tag, COORDINATOR_RANK};
use ahash::AHashMap;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Fully connected set of inboxes for ranks `1..=workers`
pub struct ChannelNetwork {
    senders: Arc<Vec<UnboundedSender<Envelope>>>,
    inboxes: Vec<Option<UnboundedReceiver<Envelope>>>,
    recv_timeout: Duration,
}

impl ChannelNetwork {
    pub fn new(workers: usize, recv_timeout: Duration) -> Self {
        let (senders, inboxes): (Vec<_>, Vec<_>) = (0..workers)
            .map(|_| {
                let (tx, rx) = mpsc::unbounded_channel();
                (tx, Some(rx))
            })
            .unzip();
        Self {
            senders: Arc::new(senders),
            inboxes,
            recv_timeout,
        }
    }

    /// Hand out the endpoint for `rank`; each endpoint can be taken once
    pub fn endpoint(&mut self, rank: Rank) -> Result<ChannelTransport> {
        let inbox = rank
            .checked_sub(1)
            .and_then(|index| self.inboxes.get_mut(index))
            .ok_or(LifeError::UnknownRank(rank))?
            .take()
            .ok_or_else(|| {
                LifeError::Communication(format!("endpoint for rank {rank} already taken"))
            })?;

        Ok(ChannelTransport {
            rank,
            peers: Arc::clone(&self.senders),
            inbox,
            stash: AHashMap::new(),
            recv_timeout: self.recv_timeout,
        })
    }
}

pub struct ChannelTransport {
    rank: Rank,
    peers: Arc<Vec<UnboundedSender<Envelope>>>,
    inbox: UnboundedReceiver<Envelope>,
    stash: AHashMap<(Rank, Tag), VecDeque<CellMessage>>,
    recv_timeout: Duration,
}

impl ChannelTransport {
    fn check_peer(&self, peer: Rank) -> Result<()> {
        if peer == COORDINATOR_RANK || peer > self.peers.len() {
            return Err(LifeError::UnknownRank(peer));
        }
        Ok(())
    }

    fn take_stashed(&mut self, source: Rank, tag: Tag) -> Option<CellMessage> {
        let queue = self.stash.get_mut(&(source, tag))?;
        let message = queue.pop_front();
        if queue.is_empty() {
            self.stash.remove(&(source, tag));
        }
        message
    }

    /// Number of early messages held back for receives not yet waited on
    pub fn stashed(&self) -> usize {
        self.stash.values().map(VecDeque::len).sum()
    }

    async fn complete(&mut self, request: RecvRequest) -> Result<CellMessage> {
        if let Some(message) = self.take_stashed(request.source, request.tag) {
            return Ok(message);
        }

        loop {
            let envelope = match tokio::time::timeout(self.recv_timeout, self.inbox.recv()).await {
                Ok(Some(envelope)) => envelope,
                Ok(None) => {
                    return Err(LifeError::Communication(format!(
                        "inbox of rank {} closed",
                        self.rank
                    )))
                }
                Err(_) => {
                    return Err(LifeError::Timeout {
                        rank: self.rank,
                        peer: request.source,
                        tag: request.tag,
                    })
                }
            };

            if envelope.source == request.source && envelope.tag == request.tag {
                return Ok(envelope.message);
            }
            self.stash
                .entry((envelope.source, envelope.tag))
                .or_default()
                .push_back(envelope.message);
        }
    }
}

impl Transport for ChannelTransport {
    fn rank(&self) -> Rank {
        self.rank
    }

    fn isend(&mut self, destination: Rank, tag: Tag, message: CellMessage) -> Result<SendRequest> {
        self.check_peer(destination)?;
        let envelope = Envelope {
            source: self.rank,
            tag,
            message,
        };
        self.peers[destination - 1].send(envelope).map_err(|_| {
            LifeError::Communication(format!(
                "rank {} could not reach rank {destination}: inbox closed",
                self.rank
            ))
        })?;
        Ok(SendRequest { destination, tag })
    }

    fn irecv(&mut self, source: Rank, tag: Tag) -> Result<RecvRequest> {
        self.check_peer(source)?;
        Ok(RecvRequest { source, tag })
    }

    fn wait_all(
        &mut self,
        requests: Vec<Request>,
    ) -> impl Future<Output = Result<Vec<CellMessage>>> + Send {
        async move {
            let mut received = Vec::with_capacity(requests.len());
            for request in requests {
                match request {
                    // The channel took ownership of the envelope at issue time
                    Request::Send(_) => {}
                    Request::Recv(recv) => received.push(self.complete(recv).await?),
                }
            }
            Ok(received)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Cell;

    fn network(workers: usize) -> ChannelNetwork {
        ChannelNetwork::new(workers, Duration::from_millis(200))
    }

    #[tokio::test]
    async fn test_send_then_receive() {
        let mut net = network(2);
        let mut a = net.endpoint(1).unwrap();
        let mut b = net.endpoint(2).unwrap();

        let send = a.isend(2, 0, CellMessage::new(3, 4, Cell::Alive)).unwrap();
        let recv = b.irecv(1, 0).unwrap();

        assert!(a.wait_all(vec![send.into()]).await.unwrap().is_empty());
        let got = b.wait_all(vec![recv.into()]).await.unwrap();
        assert_eq!(got, vec![CellMessage::new(3, 4, Cell::Alive)]);
    }

    #[tokio::test]
    async fn test_early_messages_are_matched_by_tag() {
        let mut net = network(2);
        let mut a = net.endpoint(1).unwrap();
        let mut b = net.endpoint(2).unwrap();

        // Generation 1 arrives before generation 0 is waited on
        let _ = a.isend(2, 1, CellMessage::new(0, 0, Cell::Alive)).unwrap();
        let _ = a.isend(2, 0, CellMessage::new(0, 0, Cell::Dead)).unwrap();

        let recv = b.irecv(1, 0).unwrap();
        let got = b.wait_all(vec![recv.into()]).await.unwrap();
        assert_eq!(got[0].value, Cell::Dead);
        assert_eq!(b.stashed(), 1);

        let recv = b.irecv(1, 1).unwrap();
        let got = b.wait_all(vec![recv.into()]).await.unwrap();
        assert_eq!(got[0].value, Cell::Alive);
        assert_eq!(b.stashed(), 0);
    }

    #[tokio::test]
    async fn test_missing_sender_times_out() {
        let mut net = network(2);
        let _a = net.endpoint(1).unwrap();
        let mut b = net.endpoint(2).unwrap();

        let recv = b.irecv(1, 7).unwrap();
        let err = b.wait_all(vec![recv.into()]).await.unwrap_err();
        assert!(matches!(err, LifeError::Timeout { rank: 2, peer: 1, tag: 7 }));
    }

    #[test]
    fn test_endpoint_taken_once() {
        let mut net = network(2);
        assert!(net.endpoint(1).is_ok());
        assert!(matches!(net.endpoint(1), Err(LifeError::Communication(_))));
        assert!(matches!(net.endpoint(3), Err(LifeError::UnknownRank(3))));
        assert!(matches!(net.endpoint(0), Err(LifeError::UnknownRank(0))));
    }

    #[test]
    fn test_send_to_unknown_rank() {
        let mut net = network(1);
        let mut a = net.endpoint(1).unwrap();
        let err = a.isend(4, 0, CellMessage::new(0, 0, Cell::Dead)).unwrap_err();
        assert!(matches!(err, LifeError::UnknownRank(4)));
    }

    #[test]
    fn test_send_to_dropped_endpoint() {
        let mut net = network(2);
        let mut a = net.endpoint(1).unwrap();
        drop(net.endpoint(2).unwrap());

        let err = a.isend(2, 0, CellMessage::new(1, 1, Cell::Alive)).unwrap_err();
        assert!(matches!(err, LifeError::Communication(_)));
    }

    #[tokio::test]
    async fn test_receive_on_closed_inbox() {
        let (_, inbox) = mpsc::unbounded_channel();
        let (peer_a, _rx_a) = mpsc::unbounded_channel();
        let (peer_b, _rx_b) = mpsc::unbounded_channel();
        let mut b = ChannelTransport {
            rank: 2,
            peers: Arc::new(vec![peer_a, peer_b]),
            inbox,
            stash: AHashMap::new(),
            recv_timeout: Duration::from_millis(200),
        };

        let recv = b.irecv(1, 0).unwrap();
        let err = b.wait_all(vec![recv.into()]).await.unwrap_err();
        assert!(matches!(err, LifeError::Communication(_)));
    }
}
