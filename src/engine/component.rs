use std::cell::{Cell, RefCell};
use std::fmt;
use std::process::ExitStatus;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use super::config::WorkerCommand;
use super::connection::Connection;
use super::state::ComponentStatus;
use super::timer::Deferred;
use crate::core::{Handler, InputPort, Inputs, OutputPort, Outputs};
use crate::error::GraphError;
use crate::registry::HandlerMetadata;
use crate::worker::host::WorkerLink;
use crate::worker::protocol::{HostMessage, WorkerArgs, WorkerMessage};

static NEXT_ID: AtomicUsize = AtomicUsize::new(1);

/// Process-unique component identity, used as packet owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ComponentId(usize);

impl ComponentId {
    fn next() -> Self {
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Notification emitted on every status transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusChange {
    pub component: ComponentId,
    pub status: ComponentStatus,
}

type Observer = Rc<dyn Fn(&StatusChange)>;

enum Role {
    /// Lives in the graph process; may delegate its handler to a worker.
    Host,
    /// The copy running inside a worker process, reporting to the host.
    Worker(mpsc::UnboundedSender<WorkerMessage>),
}

/// The execution unit: ports, a status state machine, and a handler run
/// either in-process or in an isolated worker.
pub struct Component {
    id: ComponentId,
    name: String,
    metadata: Option<HandlerMetadata>,
    handler: RefCell<Option<Box<dyn Handler>>>,
    inputs: Inputs,
    outputs: Outputs,
    status: Cell<ComponentStatus>,
    isolated: Cell<bool>,
    timeout: Cell<Option<Duration>>,
    kill_timer: Deferred,
    observers: RefCell<Vec<Observer>>,
    role: Role,
    worker: RefCell<Option<WorkerLink>>,
    worker_command: RefCell<WorkerCommand>,
    worker_alive: watch::Sender<bool>,
    this: Weak<Component>,
}

impl Component {
    fn build(
        name: String,
        handler: Option<Box<dyn Handler>>,
        metadata: Option<HandlerMetadata>,
        role: Role,
    ) -> Rc<Self> {
        Rc::new_cyclic(|this| Self {
            id: ComponentId::next(),
            name,
            metadata,
            handler: RefCell::new(handler),
            inputs: Inputs::default(),
            outputs: Outputs::default(),
            status: Cell::new(ComponentStatus::NotInitialized),
            isolated: Cell::new(false),
            timeout: Cell::new(None),
            kill_timer: Deferred::new(),
            observers: RefCell::new(Vec::new()),
            role,
            worker: RefCell::new(None),
            worker_command: RefCell::new(WorkerCommand::default()),
            worker_alive: watch::Sender::new(false),
            this: this.clone(),
        })
    }

    /// Component running an in-process handler value.
    pub fn local(name: impl Into<String>, handler: impl Handler + 'static) -> Rc<Self> {
        Self::from_boxed(name, Box::new(handler))
    }

    pub fn from_boxed(name: impl Into<String>, handler: Box<dyn Handler>) -> Rc<Self> {
        Self::build(name.into(), Some(handler), None, Role::Host)
    }

    /// Component running a registered handler, instantiated on initialize.
    pub fn registered(name: impl Into<String>, metadata: HandlerMetadata) -> Rc<Self> {
        Self::build(name.into(), None, Some(metadata), Role::Host)
    }

    /// Worker-side mirror of a host component, wired from the worker
    /// argument contract.
    pub(crate) fn worker(
        args: &WorkerArgs,
        metadata: HandlerMetadata,
        outbox: mpsc::UnboundedSender<WorkerMessage>,
    ) -> Rc<Self> {
        let component = Self::build(
            args.handler.clone(),
            None,
            Some(metadata),
            Role::Worker(outbox),
        );
        component.set_timeout(args.timeout);
        for name in &args.inputs {
            let initial = args.initial.contains(name);
            component.add_input(name, Connection::mirror(initial));
        }
        for name in &args.outputs {
            component.add_output(name, Connection::relay(name.clone()));
        }
        component
    }

    pub fn id(&self) -> ComponentId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn handler_id(&self) -> Option<&str> {
        self.metadata.as_ref().map(|m| m.id.as_str())
    }

    pub fn status(&self) -> ComponentStatus {
        self.status.get()
    }

    pub fn inputs(&self) -> &Inputs {
        &self.inputs
    }

    pub fn outputs(&self) -> &Outputs {
        &self.outputs
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout.get()
    }

    pub fn set_timeout(&self, timeout: Option<Duration>) {
        self.timeout.set(timeout);
    }

    pub fn is_isolated(&self) -> bool {
        self.isolated.get()
    }

    /// Requests isolated execution. Only registered handlers can be
    /// resolved inside a worker; local handlers keep running in-process.
    pub fn set_isolated(&self, isolated: bool) -> bool {
        if isolated && self.metadata.is_none() {
            warn!(component = %self.name, "local handler cannot run isolated, staying in-process");
            return false;
        }
        if self.status() != ComponentStatus::NotInitialized {
            warn!(component = %self.name, "isolation must be chosen before initialize");
            return false;
        }
        self.isolated.set(isolated);
        true
    }

    pub fn set_worker_command(&self, command: WorkerCommand) {
        *self.worker_command.borrow_mut() = command;
    }

    /// Whether the handler currently runs in a worker process.
    pub fn runs_in_worker(&self) -> bool {
        self.worker.borrow().is_some()
    }

    pub fn worker_pid(&self) -> Option<u32> {
        self.worker.borrow().as_ref().and_then(WorkerLink::pid)
    }

    pub fn add_input(&self, name: &str, connection: Rc<Connection>) {
        connection.set_downstream(self.this.clone(), name);
        self.inputs.insert(InputPort::new(name, connection));
    }

    pub fn add_output(&self, name: &str, connection: Rc<Connection>) {
        connection.add_upstream(self.this.clone());
        self.outputs
            .insert(OutputPort::new(name, self.id, self.this.clone(), connection));
    }

    pub(crate) fn check_declared_input(&self, port: &str) -> Result<(), GraphError> {
        match &self.metadata {
            Some(meta) if !meta.declares_input(port) => Err(GraphError::UnknownPort {
                component: self.name.clone(),
                port: port.to_string(),
            }),
            _ => Ok(()),
        }
    }

    pub(crate) fn check_declared_output(&self, port: &str) -> Result<(), GraphError> {
        match &self.metadata {
            Some(meta) if !meta.declares_output(port) => Err(GraphError::UnknownPort {
                component: self.name.clone(),
                port: port.to_string(),
            }),
            _ => Ok(()),
        }
    }

    pub fn subscribe(&self, observer: impl Fn(&StatusChange) + 'static) {
        self.observers.borrow_mut().push(Rc::new(observer));
    }

    pub fn clear_observers(&self) {
        self.observers.borrow_mut().clear();
    }

    fn set_status(&self, status: ComponentStatus) -> bool {
        let current = self.status.get();
        if !current.can_transition_to(status) {
            return false;
        }
        self.status.set(status);
        debug!(component = %self.name, from = current.name(), to = status.name(), "status");

        let change = StatusChange {
            component: self.id,
            status,
        };
        let observers: Vec<Observer> = self.observers.borrow().clone();
        for observer in observers {
            observer(&change);
        }
        true
    }

    /// Starts a source component: initialize, activate, execute once, then
    /// re-evaluate closure so components without data inputs terminate.
    pub fn start(&self, isolated: bool) {
        if isolated {
            self.set_isolated(true);
        }
        self.initialize();
        self.activate();
        self.execute();
        self.check();
    }

    /// NOT_INITIALIZED -> READY_TO_EXECUTE. Resolves the handler, spawning
    /// a worker for isolated components.
    pub fn initialize(&self) {
        if self.status() != ComponentStatus::NotInitialized {
            return;
        }

        if self.isolated.get() && matches!(self.role, Role::Host) {
            match self.spawn_worker() {
                Ok(()) => {
                    self.set_status(ComponentStatus::ReadyToExecute);
                    return;
                }
                Err(e) => {
                    warn!(component = %self.name, error = %e, "worker spawn failed, running in-process");
                    self.isolated.set(false);
                }
            }
        }

        if let Some(meta) = &self.metadata {
            let mut slot = self.handler.borrow_mut();
            if slot.is_none() {
                *slot = Some(meta.create_instance());
            }
        }
        self.set_status(ComponentStatus::ReadyToExecute);
    }

    fn spawn_worker(&self) -> std::io::Result<()> {
        let Some(meta) = &self.metadata else {
            return Err(std::io::Error::other("no registered handler"));
        };
        let initial = self
            .inputs
            .ports()
            .iter()
            .filter(|p| p.connection().is_initial())
            .map(|p| p.name().to_string())
            .collect();
        let args = WorkerArgs {
            handler: meta.id.clone(),
            timeout: self.timeout.get(),
            initial,
            inputs: self.inputs.names(),
            outputs: self.outputs.names(),
        };

        let command = self.worker_command.borrow().clone();
        let link = WorkerLink::spawn(&command, &args, self.this.clone())?;
        info!(component = %self.name, handler = %meta.id, pid = ?link.pid(), "worker spawned");

        // packets that arrived before the worker existed
        for port in self.inputs.ports() {
            for ip in port.connection().all_data() {
                link.send(HostMessage::In {
                    port: port.name().to_string(),
                    packet: (&ip).into(),
                });
            }
        }
        *self.worker.borrow_mut() = Some(link);
        self.worker_alive.send_replace(true);
        Ok(())
    }

    /// READY_TO_EXECUTE -> ACTIVE.
    pub fn activate(&self) {
        if self.set_status(ComponentStatus::Active) {
            self.forward_to_worker(HostMessage::Activate);
        }
    }

    /// Runs the handler once with the current port collections. A no-op
    /// while the handler is delegated to a worker or not yet resolved.
    pub fn execute(&self) {
        if self.status() == ComponentStatus::Done || self.runs_in_worker() {
            return;
        }
        {
            let Ok(mut slot) = self.handler.try_borrow_mut() else {
                return;
            };
            let Some(handler) = slot.as_mut() else {
                return;
            };
            handler.process(&self.inputs, &self.outputs);
        }
        if self.outputs.is_empty() {
            self.check();
        }
    }

    /// Executes while active and the handler keeps consuming input.
    pub fn drain(&self) {
        loop {
            if self.status() != ComponentStatus::Active || self.runs_in_worker() {
                break;
            }
            let before = self.inputs.total_pending();
            if before == 0 {
                break;
            }
            self.execute();
            if self.inputs.total_pending() >= before {
                break;
            }
        }
    }

    /// Closes the component once every data input is closed. Initial-packet
    /// inputs are ignored. Closed producers without a timeout are killed
    /// here; a closed component with outputs is killed by its own timeout,
    /// or at once when it has none and every producer is done. Idempotent.
    pub fn check(&self) {
        if self.status() >= ComponentStatus::Closed {
            return;
        }
        let all_closed = self
            .inputs
            .ports()
            .iter()
            .filter(|p| !p.connection().is_initial())
            .all(InputPort::is_closed);
        if !all_closed {
            return;
        }

        self.set_status(ComponentStatus::Closed);

        // producers without a timer wait for their consumer to close
        let producers: Vec<Rc<Component>> = self
            .inputs
            .ports()
            .iter()
            .flat_map(|p| p.connection().upstream())
            .collect();
        for producer in &producers {
            if producer.status() == ComponentStatus::Closed && producer.timeout().is_none() {
                producer.kill();
            }
        }

        if self.outputs.is_empty() {
            self.kill();
        } else if let Some(timeout) = self.timeout.get() {
            self.arm_kill(timeout);
        } else if self.runs_in_worker() {
            // the worker reports its own end once its outputs are flushed
        } else if matches!(self.role, Role::Worker(_)) {
            if self.has_data_inputs() {
                self.kill();
            }
        } else if !producers.is_empty()
            && producers.iter().all(|p| p.status() == ComponentStatus::Done)
        {
            self.kill();
        }
    }

    fn has_data_inputs(&self) -> bool {
        self.inputs
            .ports()
            .iter()
            .any(|p| !p.connection().is_initial())
    }

    fn arm_kill(&self, delay: Duration) {
        let this = self.this.clone();
        self.kill_timer.arm(delay, move || {
            if let Some(component) = this.upgrade() {
                debug!(component = %component.name, "kill timer fired");
                component.kill();
            }
        });
    }

    /// Called after every successful send: rearms the execution timeout.
    pub(crate) fn on_output(&self) {
        if self.status() == ComponentStatus::Done {
            return;
        }
        if let Some(timeout) = self.timeout.get() {
            self.arm_kill(timeout);
        }
    }

    /// Any live state -> DONE. Closes every output connection whose
    /// producers are all done, kills closed consumers without a timeout and
    /// releases the worker. Idempotent.
    pub fn kill(&self) {
        if self.status() == ComponentStatus::Done {
            return;
        }
        self.kill_timer.cancel();
        self.set_status(ComponentStatus::Done);

        for port in self.outputs.ports() {
            let connection = port.connection();
            if connection.upstream_done() {
                connection.close();
            }
            if let Some(consumer) = connection.downstream() {
                if consumer.status() == ComponentStatus::Closed
                    && consumer.timeout().is_none()
                    && !consumer.runs_in_worker()
                {
                    consumer.kill();
                }
            }
        }

        match &self.role {
            Role::Worker(outbox) => {
                let _ = outbox.send(WorkerMessage::Timeout);
            }
            Role::Host => {
                if let Some(link) = self.worker.borrow_mut().as_mut() {
                    link.stop();
                }
            }
        }
    }

    pub(crate) fn forward_to_worker(&self, message: HostMessage) {
        if let Some(link) = self.worker.borrow().as_ref() {
            link.send(message);
        }
    }

    pub(crate) fn send_to_host(&self, message: WorkerMessage) {
        if let Role::Worker(outbox) = &self.role {
            let _ = outbox.send(message);
        }
    }

    /// Dispatches a message received from this component's worker.
    pub(crate) fn handle_worker_message(&self, message: WorkerMessage) {
        match message {
            WorkerMessage::Out { port, packet } => match self.outputs.port(&port) {
                Some(output) => match packet {
                    Some(packet) => {
                        output.send_ip(packet.into_packet(Some(self.id)));
                    }
                    None => output.close(),
                },
                None => warn!(component = %self.name, %port, "worker sent on unknown output port"),
            },
            WorkerMessage::In { port } => match self.inputs.port(&port) {
                // the worker consumed its copy; consume ours in lockstep
                Some(input) => {
                    input.read();
                }
                None => warn!(component = %self.name, %port, "worker read unknown input port"),
            },
            WorkerMessage::Timeout => self.kill(),
        }
    }

    /// The worker process is gone, whether asked to stop or not.
    pub(crate) fn on_worker_exit(&self, status: std::io::Result<ExitStatus>) {
        match &status {
            Ok(code) if code.success() => info!(component = %self.name, "worker exited"),
            Ok(code) => warn!(component = %self.name, %code, "worker exited unexpectedly"),
            Err(e) => warn!(component = %self.name, error = %e, "worker wait failed"),
        }
        self.worker.borrow_mut().take();
        self.worker_alive.send_replace(false);

        if self.status() != ComponentStatus::Done {
            self.kill();
        }
    }

    /// Resolves once no worker process is attached to this component.
    pub async fn wait_worker_released(&self) {
        let mut alive = self.worker_alive.subscribe();
        let _ = alive.wait_for(|alive| !*alive).await;
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Component")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("status", &self.status.get())
            .field("isolated", &self.isolated.get())
            .finish()
    }
}
