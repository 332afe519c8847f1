//! Lua-scripted observers.
//!
//! Any Lua table can observe the host model by defining methods named after
//! the event kinds, prefixed with the configured handler prefix:
//!
//! ```lua
//! local audit = { name = "audit" }
//!
//! function audit:slotCreatedObject(obj)
//!     print("created " .. obj.name .. " in document " .. obj.document)
//! end
//!
//! function audit:slotChangedObject(obj, prop)
//!     print(obj.label .. "." .. prop .. " changed")
//! end
//!
//! observers.add(audit)
//! ```
//!
//! Handlers may be inherited through a metatable `__index`. Only the methods
//! present when `observers.add` runs are ever called.
//!
//! Documents are passed as `{ id, name, label }`, objects as
//! `{ document, name, label }` and property ids as strings.
//!
//! Scripts run through a [`ScriptHost`]. Dispatch enters the Lua state while
//! holding the bridge's gate, so the host only enters it under that gate too.

use crate::bridge::ObserverBridge;
use crate::config::ScriptConfig;
use crate::error::RegistrationError;
use crate::event::{DocumentRef, Event, EventArgs, EventKind, ObjectRef};
use crate::observer::{Observer, ObserverFault, ObserverId};
use mlua::{FromLuaMulti, Function, Lua, MultiValue, RegistryKey, Table, Value};
use std::fmt;
use std::sync::{Arc, Weak};

/// Identity of a Lua value: the address of the underlying table.
pub(crate) fn lua_identity(value: &Value) -> ObserverId {
    ObserverId(value.to_pointer().addr())
}

/// An observer implemented by a Lua table.
pub(crate) struct LuaObserver {
    lua: Lua,
    key: RegistryKey,
    id: ObserverId,
    type_name: &'static str,
    name: String,
    prefix: String,
}

impl LuaObserver {
    /// Wrap `value`. Any value is accepted here; [`Observer::validate`]
    /// rejects the ones that cannot carry handlers.
    pub(crate) fn new(lua: &Lua, value: Value, prefix: impl Into<String>) -> mlua::Result<Self> {
        let id = lua_identity(&value);
        let type_name = value.type_name();
        let name = match &value {
            Value::Table(table) => table
                .get::<Option<String>>("name")
                .ok()
                .flatten()
                .unwrap_or_else(|| format!("table@{id}")),
            other => other.type_name().to_string(),
        };
        let key = lua.create_registry_value(value)?;
        Ok(Self {
            lua: lua.clone(),
            key,
            id,
            type_name,
            name,
            prefix: prefix.into(),
        })
    }

    fn table(&self) -> mlua::Result<Table> {
        self.lua.registry_value::<Table>(&self.key)
    }

    fn arguments(&self, this: Table, event: &Event) -> mlua::Result<MultiValue> {
        let mut args = vec![Value::Table(this)];
        match &event.args {
            EventArgs::Document(doc) => {
                args.push(Value::Table(document_table(&self.lua, doc)?));
            }
            EventArgs::Object(object) => {
                args.push(Value::Table(object_table(&self.lua, object)?));
            }
            EventArgs::Changed { object, property } => {
                args.push(Value::Table(object_table(&self.lua, object)?));
                args.push(Value::String(self.lua.create_string(property.as_str())?));
            }
        }
        Ok(MultiValue::from_vec(args))
    }
}

fn document_table(lua: &Lua, doc: &DocumentRef) -> mlua::Result<Table> {
    let table = lua.create_table()?;
    table.set("id", doc.id.0)?;
    table.set("name", doc.name.as_str())?;
    table.set("label", doc.label.as_str())?;
    Ok(table)
}

fn object_table(lua: &Lua, object: &ObjectRef) -> mlua::Result<Table> {
    let table = lua.create_table()?;
    table.set("document", object.document.0)?;
    table.set("name", object.name.as_str())?;
    table.set("label", object.label.as_str())?;
    Ok(table)
}

impl Observer for LuaObserver {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn identity(&self) -> ObserverId {
        self.id
    }

    fn validate(&self) -> Result<(), RegistrationError> {
        match self.type_name {
            "nil" => Err(RegistrationError::Null),
            "table" => Ok(()),
            other => Err(RegistrationError::NotAnObject {
                found: other.to_string(),
            }),
        }
    }

    fn has_handler(&self, kind: EventKind) -> bool {
        let Ok(table) = self.table() else {
            return false;
        };
        matches!(
            table.get::<Value>(kind.handler_name(&self.prefix)),
            Ok(Value::Function(_))
        )
    }

    fn invoke(&self, event: &Event) -> Result<(), ObserverFault> {
        let method = event.kind.handler_name(&self.prefix);
        let this = self.table().map_err(ObserverFault::conversion)?;
        let handler = match this.get::<Value>(method.as_str()) {
            Ok(Value::Function(handler)) => handler,
            Ok(other) => {
                return Err(ObserverFault::handler(format!(
                    "{method} is {}, not a function",
                    other.type_name()
                )));
            }
            Err(err) => return Err(ObserverFault::handler(err)),
        };
        let args = self
            .arguments(this, event)
            .map_err(ObserverFault::conversion)?;
        call_handler(&handler, args).map_err(ObserverFault::handler)
    }
}

fn call_handler(handler: &Function, args: MultiValue) -> mlua::Result<()> {
    handler.call::<()>(args)
}

impl fmt::Debug for LuaObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LuaObserver")
            .field("name", &self.name)
            .field("id", &self.id)
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Script API
// ---------------------------------------------------------------------------

fn upgrade(bridge: &Weak<ObserverBridge>) -> Option<Arc<ObserverBridge>> {
    bridge.upgrade().filter(|b| !b.is_shut_down())
}

/// Install the registration API as the global `config.api_global`:
///
/// - `add(obj)` registers a table; raises on nil or non-table values
/// - `remove(obj)` unregisters; returns whether it was registered
/// - `count()` returns the number of registered observers
///
/// The API only holds a weak reference to `bridge`.
pub(crate) fn install_lua_api(
    lua: &Lua,
    bridge: &Arc<ObserverBridge>,
    config: &ScriptConfig,
) -> mlua::Result<Table> {
    let api = lua.create_table()?;

    let weak = Arc::downgrade(bridge);
    let prefix = config.handler_prefix.clone();
    let add = lua.create_function(move |lua, value: Value| {
        let bridge = upgrade(&weak)
            .ok_or_else(|| mlua::Error::external(RegistrationError::ShutDown))?;
        let observer = LuaObserver::new(lua, value, prefix.as_str())?;
        bridge
            .add_observer(Arc::new(observer))
            .map_err(mlua::Error::external)
    })?;
    api.set("add", add)?;

    let weak = Arc::downgrade(bridge);
    let remove = lua.create_function(move |_, value: Value| {
        Ok(upgrade(&weak).is_some_and(|bridge| bridge.remove_observer_by_id(lua_identity(&value))))
    })?;
    api.set("remove", remove)?;

    let weak = Arc::downgrade(bridge);
    let count = lua.create_function(move |_, ()| {
        Ok(upgrade(&weak).map_or(0, |bridge| bridge.observer_count()))
    })?;
    api.set("count", count)?;

    lua.globals().set(config.api_global.as_str(), api.clone())?;
    tracing::debug!(global = %config.api_global, prefix = %config.handler_prefix, "lua observer api installed");
    Ok(api)
}

// ---------------------------------------------------------------------------
// Script host
// ---------------------------------------------------------------------------

/// A Lua state with the registration API installed for one bridge.
///
/// Every entry into the state holds the bridge's dispatch gate, the lock
/// emissions hold while Lua handlers run. Scripts and emissions may then
/// run on different threads.
pub struct ScriptHost {
    lua: Lua,
    bridge: Arc<ObserverBridge>,
}

impl ScriptHost {
    pub fn new(bridge: &Arc<ObserverBridge>, config: &ScriptConfig) -> mlua::Result<Self> {
        let lua = Lua::new();
        bridge.exclusive(|| install_lua_api(&lua, bridge, config))?;
        Ok(Self {
            lua,
            bridge: Arc::clone(bridge),
        })
    }

    /// Run `chunk`. `name` labels it in error messages, e.g. `@observers.lua`.
    pub fn exec(&self, chunk: &str, name: &str) -> mlua::Result<()> {
        self.with_lua(|lua| lua.load(chunk).set_name(name).exec())
    }

    /// Evaluate `chunk` and convert its results.
    pub fn eval<R: FromLuaMulti>(&self, chunk: &str) -> mlua::Result<R> {
        self.with_lua(|lua| lua.load(chunk).eval())
    }

    /// Use the state directly. Do not keep clones of it past `f`.
    pub fn with_lua<R>(&self, f: impl FnOnce(&Lua) -> R) -> R {
        self.bridge.exclusive(|| f(&self.lua))
    }

    pub fn bridge(&self) -> &Arc<ObserverBridge> {
        &self.bridge
    }
}

impl fmt::Debug for ScriptHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptHost")
            .field("bridge", &self.bridge)
            .finish_non_exhaustive()
    }
}
