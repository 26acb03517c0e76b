use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde_json::Value;
use std::rc::Rc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::LocalSet;
use tracing::{info, warn};

use super::component::{Component, StatusChange};
use super::config::{GraphSpec, RuntimeConfig};
use super::connection::{Connection, ConnectionKind};
use super::state::ComponentStatus;
use crate::core::{HandlerRef, InformationPacket};
use crate::error::GraphError;
use crate::registry::HandlerRegistry;

/// Composition root for one execution: loads components, wires them and
/// drives them to completion.
pub struct Graph {
    config: RuntimeConfig,
    registry: HandlerRegistry,
    components: IndexMap<String, Rc<Component>>,
}

impl Graph {
    pub fn new(config: RuntimeConfig) -> Self {
        Self::with_registry(config, HandlerRegistry::builtin())
    }

    pub fn with_registry(config: RuntimeConfig, registry: HandlerRegistry) -> Self {
        Self {
            config,
            registry,
            components: IndexMap::new(),
        }
    }

    pub fn from_json(config: Value) -> Result<Self> {
        let spec = GraphSpec::from_value(config).context("parsing graph description")?;
        Ok(Self::from_spec(spec)?)
    }

    pub fn from_spec(spec: GraphSpec) -> Result<Self, GraphError> {
        let mut graph = Self::new(spec.runtime);

        for component in spec.components {
            let loaded = graph.load_as(&component.id, component.handler.as_str())?;
            if component.timeout.is_some() {
                loaded.set_timeout(component.timeout);
            }
            if component.isolated {
                loaded.set_isolated(true);
            }
            if let Some(initial) = component.initial {
                graph.initialize(&loaded, initial)?;
            }
        }

        for connection in spec.connections {
            let from = graph.require(&connection.from)?;
            let to = graph.require(&connection.to)?;
            graph.connect(
                &from,
                &connection.from_port,
                &to,
                &connection.to_port,
                connection.capacity,
                connection.timeout,
            )?;
        }

        Ok(graph)
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut HandlerRegistry {
        &mut self.registry
    }

    /// Loads a component named after its handler.
    pub fn load(&mut self, handler: impl Into<HandlerRef>) -> Result<Rc<Component>, GraphError> {
        let handler = handler.into();
        let base = handler.name().unwrap_or("component").to_string();
        let name = format!("{}{}", base, self.components.len() + 1);
        self.load_as(&name, handler)
    }

    pub fn load_as(
        &mut self,
        name: &str,
        handler: impl Into<HandlerRef>,
    ) -> Result<Rc<Component>, GraphError> {
        if self.components.contains_key(name) {
            return Err(GraphError::InvalidConfig(format!(
                "component `{}` is already loaded",
                name
            )));
        }

        let component = match handler.into() {
            HandlerRef::Named(id) => {
                let metadata = self
                    .registry
                    .get(&id)
                    .cloned()
                    .ok_or(GraphError::UnknownHandler(id))?;
                Component::registered(name, metadata)
            }
            HandlerRef::Local(handler) => Component::from_boxed(name, handler),
        };
        component.set_timeout(self.config.component_timeout);
        component.set_worker_command(self.config.worker.clone());

        self.components.insert(name.to_string(), component.clone());
        Ok(component)
    }

    pub fn component(&self, name: &str) -> Option<Rc<Component>> {
        self.components.get(name).cloned()
    }

    fn require(&self, name: &str) -> Result<Rc<Component>, GraphError> {
        self.component(name)
            .ok_or_else(|| GraphError::UnknownComponent(name.to_string()))
    }

    pub fn components(&self) -> impl Iterator<Item = &Rc<Component>> {
        self.components.values()
    }

    /// Seeds initial packets: one single-shot port per key of an object
    /// value, or the `in` port for anything else.
    pub fn initialize(&mut self, component: &Rc<Component>, value: Value) -> Result<(), GraphError> {
        let entries: Vec<(String, Value)> = match value {
            Value::Object(map) => map.into_iter().collect(),
            other => vec![("in".to_string(), other)],
        };

        for (port, data) in entries {
            component.check_declared_input(&port)?;
            if component.inputs().contains(&port) {
                return Err(GraphError::InputAlreadyConnected {
                    component: component.name().to_string(),
                    port,
                });
            }
            let connection = Connection::initial();
            component.add_input(&port, connection.clone());
            connection
                .put_data(InformationPacket::new(data))
                .map_err(|e| GraphError::InvalidConfig(e.to_string()))?;
        }
        Ok(())
    }

    /// Wires `up.up_port` to `down.down_port` through a buffered connection.
    /// A second producer on the same input joins the existing connection.
    pub fn connect(
        &mut self,
        up: &Rc<Component>,
        up_port: &str,
        down: &Rc<Component>,
        down_port: &str,
        capacity: usize,
        timeout: Option<Duration>,
    ) -> Result<Rc<Connection>, GraphError> {
        if up.outputs().contains(up_port) {
            warn!(component = %up.name(), port = up_port, "output port already has a consumer");
            return Err(GraphError::OutputAlreadyConnected {
                component: up.name().to_string(),
                port: up_port.to_string(),
            });
        }
        up.check_declared_output(up_port)?;
        down.check_declared_input(down_port)?;

        if let Some(existing) = down.inputs().connection(down_port) {
            if !matches!(existing.kind(), ConnectionKind::Buffered { .. }) {
                return Err(GraphError::InputAlreadyConnected {
                    component: down.name().to_string(),
                    port: down_port.to_string(),
                });
            }
            up.add_output(up_port, existing.clone());
            return Ok(existing);
        }

        let connection = Connection::buffered(capacity, timeout);
        up.add_output(up_port, connection.clone());
        down.add_input(down_port, connection.clone());
        Ok(connection)
    }

    /// Components whose every input is an initial packet.
    pub fn starters(&self) -> Vec<Rc<Component>> {
        self.components
            .values()
            .filter(|c| c.inputs().ports().iter().all(|p| p.connection().is_initial()))
            .cloned()
            .collect()
    }

    fn all_done(&self) -> bool {
        self.components
            .values()
            .all(|c| c.status() == ComponentStatus::Done)
    }

    /// Starts every starter and resolves once all components are done.
    /// `on_complete` fires exactly once. Several starters run isolated so
    /// independent entry points progress concurrently.
    pub async fn run(&self, on_complete: impl FnOnce()) -> Result<(), GraphError> {
        if self.components.is_empty() {
            on_complete();
            return Ok(());
        }
        let starters = self.starters();
        if starters.is_empty() {
            return Err(GraphError::NoStarter);
        }

        let (tx, mut rx) = mpsc::unbounded_channel::<StatusChange>();
        for component in self.components.values() {
            let tx = tx.clone();
            component.subscribe(move |change| {
                let _ = tx.send(*change);
            });
        }
        drop(tx);

        let isolate = starters.len() > 1;
        let local = LocalSet::new();
        local
            .run_until(async {
                for starter in &starters {
                    starter.start(isolate);
                }
                while !self.all_done() {
                    if rx.recv().await.is_none() {
                        break;
                    }
                }
            })
            .await;

        for component in self.components.values() {
            component.clear_observers();
        }
        info!(components = self.components.len(), "graph complete");
        on_complete();

        // worker exits are observed by tasks owned by `local`
        let released = async {
            for component in self.components.values() {
                component.wait_worker_released().await;
            }
        };
        let waited = local
            .run_until(tokio::time::timeout(self.config.shutdown_grace, released))
            .await;
        if waited.is_err() {
            warn!("workers still running after shutdown grace");
        }

        Ok(())
    }
}
