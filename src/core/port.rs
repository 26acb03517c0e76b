use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::cell::RefCell;
use std::rc::{Rc, Weak};

use super::ip::InformationPacket;
use crate::engine::{Component, ComponentId, Connection};

/// Named read end of a connection.
#[derive(Clone)]
pub struct InputPort {
    name: String,
    connection: Rc<Connection>,
}

impl InputPort {
    pub(crate) fn new(name: impl Into<String>, connection: Rc<Connection>) -> Self {
        Self {
            name: name.into(),
            connection,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Next queued packet, or `None` when the connection is empty or closed.
    pub fn read(&self) -> Option<InformationPacket> {
        self.connection.get_data()
    }

    pub fn pending(&self) -> usize {
        self.connection.pending_count()
    }

    pub fn is_closed(&self) -> bool {
        self.connection.is_closed()
    }

    pub fn connection(&self) -> &Rc<Connection> {
        &self.connection
    }
}

/// Named write end of a connection.
#[derive(Clone)]
pub struct OutputPort {
    name: String,
    owner: ComponentId,
    component: Weak<Component>,
    connection: Rc<Connection>,
}

impl OutputPort {
    pub(crate) fn new(
        name: impl Into<String>,
        owner: ComponentId,
        component: Weak<Component>,
        connection: Rc<Connection>,
    ) -> Self {
        Self {
            name: name.into(),
            owner,
            component,
            connection,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Wraps `data` in a normal packet and sends it. Returns `false` once the
    /// connection has closed.
    pub fn send(&self, data: Value) -> bool {
        self.send_ip(InformationPacket::new(data).with_owner(Some(self.owner)))
    }

    pub fn send_ip(&self, ip: InformationPacket) -> bool {
        if self.connection.put_data(ip).is_err() {
            return false;
        }
        if let Some(component) = self.component.upgrade() {
            component.on_output();
        }
        true
    }

    /// End-of-stream sentinel: no more data will be sent on this port.
    pub fn close(&self) {
        self.connection.end_of_stream(Some(self.owner));
    }

    pub fn is_closed(&self) -> bool {
        self.connection.is_closed()
    }

    pub fn connection(&self) -> &Rc<Connection> {
        &self.connection
    }
}

/// Ordered collection of a component's input ports.
///
/// Cloning is cheap and shares the underlying map, so a handler may move a
/// clone into a spawned task.
#[derive(Clone, Default)]
pub struct Inputs {
    ports: Rc<RefCell<IndexMap<String, InputPort>>>,
}

impl Inputs {
    pub(crate) fn insert(&self, port: InputPort) {
        self.ports.borrow_mut().insert(port.name.clone(), port);
    }

    pub fn port(&self, name: &str) -> Option<InputPort> {
        self.ports.borrow().get(name).cloned()
    }

    pub fn connection(&self, name: &str) -> Option<Rc<Connection>> {
        self.ports.borrow().get(name).map(|p| p.connection.clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.ports.borrow().contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.ports.borrow().keys().cloned().collect()
    }

    pub fn ports(&self) -> Vec<InputPort> {
        self.ports.borrow().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.ports.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.ports.borrow().is_empty()
    }

    /// Reads one packet payload from a single port.
    pub fn read_port(&self, name: &str) -> Option<Value> {
        self.port(name)?.read().map(InformationPacket::into_data)
    }

    /// Whole-input read. A single port unwraps to its bare payload; several
    /// ports read into an object keyed by port name, with `null` for ports
    /// that have nothing queued.
    pub fn read(&self) -> Value {
        let ports = self.ports();
        match ports.as_slice() {
            [] => Value::Null,
            [single] => single
                .read()
                .map(InformationPacket::into_data)
                .unwrap_or(Value::Null),
            many => {
                let mut values = Map::new();
                for port in many {
                    let data = port.read().map_or(Value::Null, InformationPacket::into_data);
                    values.insert(port.name.clone(), data);
                }
                Value::Object(values)
            }
        }
    }

    pub fn pending(&self, name: &str) -> usize {
        self.port(name).map_or(0, |p| p.pending())
    }

    pub fn total_pending(&self) -> usize {
        self.ports().iter().map(InputPort::pending).sum()
    }
}

/// Ordered collection of a component's output ports.
#[derive(Clone, Default)]
pub struct Outputs {
    ports: Rc<RefCell<IndexMap<String, OutputPort>>>,
}

impl Outputs {
    pub(crate) fn insert(&self, port: OutputPort) {
        self.ports.borrow_mut().insert(port.name.clone(), port);
    }

    pub fn port(&self, name: &str) -> Option<OutputPort> {
        self.ports.borrow().get(name).cloned()
    }

    pub fn connection(&self, name: &str) -> Option<Rc<Connection>> {
        self.ports.borrow().get(name).map(|p| p.connection.clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.ports.borrow().contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.ports.borrow().keys().cloned().collect()
    }

    pub fn ports(&self) -> Vec<OutputPort> {
        self.ports.borrow().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.ports.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.ports.borrow().is_empty()
    }

    /// Whole-output send. With a single port the value is sent as is; with
    /// several, each key of an object value goes to the port of that name.
    /// Returns `false` if anything could not be delivered.
    pub fn send(&self, value: Value) -> bool {
        let ports = self.ports();
        match ports.as_slice() {
            [] => false,
            [single] => single.send(value),
            _ => match value {
                Value::Object(values) => {
                    let mut delivered = true;
                    for (name, data) in values {
                        delivered &= self.port(&name).is_some_and(|p| p.send(data));
                    }
                    delivered
                }
                _ => false,
            },
        }
    }

    /// Sends the end-of-stream sentinel on every port.
    pub fn close(&self) {
        for port in self.ports() {
            port.close();
        }
    }
}
