use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::fmt;
use std::rc::{Rc, Weak};
use std::time::Duration;
use tracing::debug;

use super::component::{Component, ComponentId};
use super::state::ComponentStatus;
use super::timer::Deferred;
use crate::core::{InformationPacket, Queue};
use crate::error::ConnectionError;
use crate::worker::protocol::{HostMessage, WirePacket, WorkerMessage};

/// Scheduling policy attached to a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionKind {
    /// Unbounded FIFO, closed explicitly or by the end-of-stream sentinel.
    Plain,
    /// Activates its consumer once `capacity` packets are pending and
    /// force-closes after `idle_timeout` without a new arrival.
    Buffered {
        capacity: usize,
        idle_timeout: Option<Duration>,
    },
    /// Holds one preloaded packet and closes after it is read.
    Initial,
    /// Worker-side copy of a host input connection. Every dequeue is
    /// acknowledged to the host.
    Mirror { initial: bool },
    /// Worker-side stand-in for a host output connection. Packets are
    /// forwarded to the host instead of queued.
    Relay { port: String },
}

/// Ordered, closable queue between one or more producers and a single
/// consumer.
pub struct Connection {
    kind: ConnectionKind,
    queue: RefCell<Queue<InformationPacket>>,
    closed: Cell<bool>,
    ended: RefCell<HashSet<Option<ComponentId>>>,
    upstream: RefCell<Vec<Weak<Component>>>,
    downstream: RefCell<Weak<Component>>,
    port: RefCell<String>,
    idle: Deferred,
    this: Weak<Connection>,
}

impl Connection {
    pub fn new(kind: ConnectionKind) -> Rc<Self> {
        Rc::new_cyclic(|this| Self {
            kind,
            queue: RefCell::new(Queue::new()),
            closed: Cell::new(false),
            ended: RefCell::new(HashSet::new()),
            upstream: RefCell::new(Vec::new()),
            downstream: RefCell::new(Weak::new()),
            port: RefCell::new(String::new()),
            idle: Deferred::new(),
            this: this.clone(),
        })
    }

    pub fn plain() -> Rc<Self> {
        Self::new(ConnectionKind::Plain)
    }

    pub fn buffered(capacity: usize, idle_timeout: Option<Duration>) -> Rc<Self> {
        Self::new(ConnectionKind::Buffered {
            capacity,
            idle_timeout,
        })
    }

    pub fn initial() -> Rc<Self> {
        Self::new(ConnectionKind::Initial)
    }

    pub(crate) fn mirror(initial: bool) -> Rc<Self> {
        Self::new(ConnectionKind::Mirror { initial })
    }

    pub(crate) fn relay(port: impl Into<String>) -> Rc<Self> {
        Self::new(ConnectionKind::Relay { port: port.into() })
    }

    pub fn kind(&self) -> &ConnectionKind {
        &self.kind
    }

    /// Whether this connection delivers a one-time parameter rather than
    /// runtime data.
    pub fn is_initial(&self) -> bool {
        matches!(
            self.kind,
            ConnectionKind::Initial | ConnectionKind::Mirror { initial: true }
        )
    }

    pub fn is_closed(&self) -> bool {
        self.closed.get()
    }

    pub fn pending_count(&self) -> usize {
        self.queue.borrow().len()
    }

    pub fn has_data(&self) -> bool {
        !self.queue.borrow().is_empty()
    }

    /// Snapshot of everything queued, oldest first.
    pub fn all_data(&self) -> Vec<InformationPacket> {
        self.queue.borrow().iter().cloned().collect()
    }

    /// Name of the downstream input port this connection feeds.
    pub fn port_name(&self) -> String {
        self.port.borrow().clone()
    }

    pub fn downstream(&self) -> Option<Rc<Component>> {
        self.downstream.borrow().upgrade()
    }

    pub fn upstream(&self) -> Vec<Rc<Component>> {
        self.upstream
            .borrow()
            .iter()
            .filter_map(Weak::upgrade)
            .collect()
    }

    pub(crate) fn set_downstream(&self, component: Weak<Component>, port: &str) {
        *self.downstream.borrow_mut() = component;
        *self.port.borrow_mut() = port.to_string();
    }

    pub(crate) fn add_upstream(&self, component: Weak<Component>) {
        self.upstream.borrow_mut().push(component);
    }

    /// True when every producer has reached at least `status`. Dropped
    /// producers count as finished.
    fn upstream_reached(&self, status: ComponentStatus) -> bool {
        self.upstream
            .borrow()
            .iter()
            .all(|c| c.upgrade().map_or(true, |c| c.status() >= status))
    }

    pub(crate) fn upstream_done(&self) -> bool {
        self.upstream_reached(ComponentStatus::Done)
    }

    pub fn put_data(&self, mut ip: InformationPacket) -> Result<(), ConnectionError> {
        if self.closed.get() {
            return Err(ConnectionError::Closed);
        }
        ip.set_owner(None);

        if let ConnectionKind::Relay { port } = &self.kind {
            self.notify_host(WorkerMessage::Out {
                port: port.clone(),
                packet: Some(WirePacket::from(&ip)),
            });
            return Ok(());
        }

        let downstream = self.downstream();
        if let Some(component) = downstream.as_ref().filter(|c| c.runs_in_worker()) {
            component.forward_to_worker(HostMessage::In {
                port: self.port_name(),
                packet: WirePacket::from(&ip),
            });
        }
        self.queue.borrow_mut().enqueue(ip);

        match &self.kind {
            ConnectionKind::Buffered {
                capacity,
                idle_timeout,
            } => self.schedule(downstream, *capacity, *idle_timeout),
            ConnectionKind::Mirror { .. } => {
                if let Some(component) = downstream {
                    if component.status() == ComponentStatus::Active {
                        component.drain();
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn schedule(
        &self,
        downstream: Option<Rc<Component>>,
        capacity: usize,
        idle_timeout: Option<Duration>,
    ) {
        if let Some(component) = downstream {
            if component.status() == ComponentStatus::NotInitialized {
                component.initialize();
            }
            if component.status() == ComponentStatus::ReadyToExecute
                && self.pending_count() >= capacity
            {
                component.activate();
            }
            if component.status() == ComponentStatus::Active && !component.runs_in_worker() {
                component.drain();
            }
        }

        for producer in self.upstream() {
            if producer.status() == ComponentStatus::Active {
                producer.check();
            }
        }

        if let Some(timeout) = idle_timeout {
            self.arm_idle_close(timeout);
        }
    }

    fn arm_idle_close(&self, timeout: Duration) {
        if self.closed.get() {
            return;
        }
        let this = self.this.clone();
        self.idle.arm(timeout, move || {
            if let Some(connection) = this.upgrade() {
                debug!(port = %connection.port_name(), "connection idle timeout");
                connection.close();
            }
        });
    }

    /// End-of-stream sentinel from `producer`. With fan-in the connection
    /// closes only after every distinct producer has sent it and the queue
    /// drained; repeated sentinels from one producer count once.
    pub fn end_of_stream(&self, producer: Option<ComponentId>) {
        if self.closed.get() {
            return;
        }
        if let ConnectionKind::Relay { port } = &self.kind {
            self.notify_host(WorkerMessage::Out {
                port: port.clone(),
                packet: None,
            });
            return;
        }

        if !self.ended.borrow_mut().insert(producer) {
            return;
        }
        if self.stream_ended() && !self.has_data() {
            self.close();
        }
    }

    fn stream_ended(&self) -> bool {
        let producers = self.upstream.borrow().len().max(1);
        self.ended.borrow().len() >= producers
    }

    pub fn get_data(&self) -> Option<InformationPacket> {
        if self.closed.get() {
            return None;
        }
        let mut ip = self.queue.borrow_mut().dequeue()?;
        let downstream = self.downstream();
        ip.set_owner(downstream.as_ref().map(|c| c.id()));
        let drained = !self.has_data();

        match &self.kind {
            ConnectionKind::Initial => self.close(),
            ConnectionKind::Mirror { initial } => {
                if let Some(component) = &downstream {
                    component.send_to_host(WorkerMessage::In {
                        port: self.port_name(),
                    });
                }
                if *initial {
                    self.close();
                }
            }
            ConnectionKind::Buffered {
                idle_timeout: Some(timeout),
                ..
            } if drained && self.upstream_reached(ComponentStatus::Closed) => {
                self.arm_idle_close(*timeout);
            }
            _ => {}
        }

        if drained && self.stream_ended() {
            self.close();
        }
        Some(ip)
    }

    /// Discards everything queued.
    pub fn purge_data(&self) -> usize {
        self.queue.borrow_mut().clear()
    }

    /// Closes the connection and lets the consumer re-evaluate. Idempotent.
    pub fn close(&self) {
        if self.closed.replace(true) {
            return;
        }
        self.idle.cancel();
        let purged = self.purge_data();
        debug!(port = %self.port_name(), purged, "connection closed");

        if let Some(component) = self.downstream() {
            if component.runs_in_worker() {
                component.forward_to_worker(HostMessage::Close {
                    port: self.port_name(),
                });
            }
            component.check();
        }
    }

    fn notify_host(&self, message: WorkerMessage) {
        if let Some(component) = self.upstream().first() {
            component.send_to_host(message);
        }
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("kind", &self.kind)
            .field("port", &*self.port.borrow())
            .field("pending", &self.pending_count())
            .field("closed", &self.closed.get())
            .finish()
    }
}
