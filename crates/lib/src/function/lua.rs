//! Lua bindings for function builders.
//!
//! Builders are userdata. Every configuration method returns the same
//! userdata, so calls chain the way they do from Rust:
//!
//! ```lua
//! local orders = stack.func("orders", { handler = "src/orders.handler" })
//!   :sizing({ memory = 512, timeout = 30 })
//!   :env({ TABLE = "orders" })
//!   :route("POST", "/orders")
//!   :on_topic("order-events")
//!
//! stack.func("audit"):grant(orders:handle(), { "lambda:InvokeFunction" })
//! ```
//!
//! `build()` and `handle()` return a `FunctionHandle` table (`id`, `identity`,
//! `arn`) marked through its metatable's `__type` field.

use mlua::prelude::*;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use super::{Environment, FunctionBuilder, HttpMethod, SizingPatch};
use crate::consts::FUNCTION_HANDLE_TYPE;
use crate::fragment::{
  AttachmentOptions, BlobNotification, Fragment, FragmentKind, QueueSubscription, StreamingSource, TopicSubscription,
};
use crate::provision::ResourceHandle;

/// Options accepted by `stack.func(id, opts)` and `scope:func(id, opts)`.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FunctionOptions {
  pub name: Option<String>,
  pub handler: Option<String>,
  pub sizing: Option<SizingPatch>,
  pub env: Option<Environment>,
}

impl FunctionOptions {
  pub fn from_lua_value(lua: &Lua, value: Option<LuaValue>) -> LuaResult<Self> {
    match value {
      None | Some(LuaValue::Nil) => Ok(Self::default()),
      Some(value @ LuaValue::Table(_)) => descriptor(lua, value, "function options"),
      Some(other) => Err(LuaError::external(format!(
        "function options must be a table, got {}",
        other.type_name()
      ))),
    }
  }

  /// Apply the options through the builder's chainable setters.
  pub fn apply(self, builder: &FunctionBuilder) {
    if let Some(name) = self.name {
      builder.name(name);
    }
    if let Some(handler) = self.handler {
      builder.handler(handler);
    }
    if let Some(sizing) = self.sizing {
      builder.configure_sizing(sizing);
    }
    if let Some(env) = self.env {
      builder.set_environment(env);
    }
  }
}

fn descriptor<T: DeserializeOwned>(lua: &Lua, value: LuaValue, what: &str) -> LuaResult<T> {
  lua
    .from_value(value)
    .map_err(|e| LuaError::external(format!("invalid {}: {}", what, e)))
}

/// Accept either a bare source name or a full descriptor table.
fn shorthand<T: DeserializeOwned>(
  lua: &Lua,
  value: LuaValue,
  what: &str,
  from_name: impl FnOnce(String) -> T,
) -> LuaResult<T> {
  match value {
    LuaValue::String(s) => Ok(from_name(s.to_str()?.to_string())),
    LuaValue::Table(_) => descriptor(lua, value, what),
    other => Err(LuaError::external(format!(
      "{} must be a string or table, got {}",
      what,
      other.type_name()
    ))),
  }
}

fn env_from_lua(table: LuaTable) -> LuaResult<Environment> {
  let mut env = Environment::new();
  for pair in table.pairs::<String, LuaValue>() {
    let (key, value) = pair?;
    let value = match value {
      LuaValue::String(s) => s.to_str()?.to_string(),
      LuaValue::Integer(i) => i.to_string(),
      LuaValue::Number(n) => n.to_string(),
      LuaValue::Boolean(b) => b.to_string(),
      other => {
        return Err(LuaError::external(format!(
          "environment value for '{}' must be a string, number or boolean, got {}",
          key,
          other.type_name()
        )));
      }
    };
    env.insert(key, value);
  }
  Ok(env)
}

fn actions_from_lua(value: LuaValue) -> LuaResult<Vec<String>> {
  match value {
    LuaValue::String(s) => Ok(vec![s.to_str()?.to_string()]),
    LuaValue::Table(t) => t.sequence_values::<String>().collect(),
    other => Err(LuaError::external(format!(
      "grant actions must be a string or list of strings, got {}",
      other.type_name()
    ))),
  }
}

/// Resolve a grant target: an ARN string or a `FunctionHandle` table.
pub fn grant_target(value: LuaValue) -> LuaResult<String> {
  match value {
    LuaValue::String(s) => Ok(s.to_str()?.to_string()),
    LuaValue::Table(t) => {
      if let Some(mt) = t.metatable()
        && let Ok(type_name) = mt.get::<String>("__type")
        && type_name == FUNCTION_HANDLE_TYPE
      {
        return t.get::<String>("arn");
      }
      Err(LuaError::external("grant target table must be a FunctionHandle"))
    }
    other => Err(LuaError::external(format!(
      "grant target must be an ARN or FunctionHandle, got {}",
      other.type_name()
    ))),
  }
}

/// Convert a handle into a `FunctionHandle` table.
pub fn handle_to_lua(lua: &Lua, handle: &ResourceHandle) -> LuaResult<LuaTable> {
  let table = lua.create_table()?;
  table.set("id", handle.id.0.as_str())?;
  table.set("identity", handle.identity.as_str())?;
  table.set("arn", handle.arn.as_str())?;

  let mt = lua.create_table()?;
  mt.set("__type", FUNCTION_HANDLE_TYPE)?;
  table.set_metatable(Some(mt))?;
  Ok(table)
}

fn builder_of(ud: &LuaAnyUserData) -> LuaResult<FunctionBuilder> {
  Ok(ud.borrow::<FunctionBuilder>()?.clone())
}

impl LuaUserData for FunctionBuilder {
  fn add_fields<F: LuaUserDataFields<Self>>(fields: &mut F) {
    fields.add_field_method_get("id", |_, this| Ok(this.logical_id()));
    fields.add_field_method_get("identity", |_, this| Ok(this.identity()));
    fields.add_field_method_get("scope", |_, this| Ok(this.scope().0));
    fields.add_field_method_get("built", |_, this| Ok(this.is_built()));
    fields.add_field_method_get("route_info", |_, this| Ok(this.route_info().map(|r| r.to_string())));
  }

  fn add_methods<M: LuaUserDataMethods<Self>>(methods: &mut M) {
    methods.add_function("name", |_, (ud, name): (LuaAnyUserData, String)| {
      builder_of(&ud)?.name(name);
      Ok(ud)
    });

    methods.add_function("handler", |_, (ud, handler): (LuaAnyUserData, String)| {
      builder_of(&ud)?.handler(handler);
      Ok(ud)
    });

    methods.add_function("sizing", |lua, (ud, patch): (LuaAnyUserData, LuaValue)| {
      let patch: SizingPatch = descriptor(lua, patch, "sizing")?;
      builder_of(&ud)?.configure_sizing(patch);
      Ok(ud)
    });

    methods.add_function("env", |_, (ud, vars): (LuaAnyUserData, LuaTable)| {
      let env = env_from_lua(vars)?;
      builder_of(&ud)?.set_environment(env);
      Ok(ud)
    });

    methods.add_function("route", |_, (ud, method, path): (LuaAnyUserData, String, String)| {
      let method: HttpMethod = method.parse().map_err(LuaError::external)?;
      builder_of(&ud)?.route(method, path);
      Ok(ud)
    });

    methods.add_function(
      "add_trigger",
      |lua, (ud, kind, desc): (LuaAnyUserData, String, LuaValue)| {
        let kind: FragmentKind = kind.parse().map_err(LuaError::external)?;
        let value: serde_json::Value = descriptor(lua, desc, kind.as_str())?;
        let fragment = Fragment::from_descriptor(kind, value)
          .map_err(|e| LuaError::external(format!("invalid {}: {}", kind, e)))?;
        builder_of(&ud)?.add_trigger(fragment);
        Ok(ud)
      },
    );

    methods.add_function("on_topic", |lua, (ud, topic): (LuaAnyUserData, LuaValue)| {
      let topic = shorthand(lua, topic, "topic subscription", |topic| TopicSubscription {
        topic,
        filter_policy: None,
      })?;
      builder_of(&ud)?.add_trigger(topic);
      Ok(ud)
    });

    methods.add_function("on_queue", |lua, (ud, queue): (LuaAnyUserData, LuaValue)| {
      let queue = shorthand(lua, queue, "queue subscription", |queue| QueueSubscription {
        queue,
        batch_size: None,
      })?;
      builder_of(&ud)?.on_queue(queue);
      Ok(ud)
    });

    methods.add_function("on_bucket", |lua, (ud, bucket): (LuaAnyUserData, LuaValue)| {
      let notification = shorthand(lua, bucket, "blob notification", BlobNotification::new)?;
      builder_of(&ud)?.on_bucket(notification);
      Ok(ud)
    });

    methods.add_function("on_schedule", |_, (ud, expression): (LuaAnyUserData, String)| {
      builder_of(&ud)?.on_schedule(expression);
      Ok(ud)
    });

    methods.add_function("on_stream", |lua, (ud, stream): (LuaAnyUserData, LuaValue)| {
      let source = shorthand(lua, stream, "streaming source", |stream| StreamingSource {
        stream,
        starting_position: Default::default(),
        batch_size: None,
      })?;
      builder_of(&ud)?.on_stream(source);
      Ok(ud)
    });

    methods.add_function(
      "grant",
      |_, (ud, target, actions): (LuaAnyUserData, LuaValue, LuaValue)| {
        let target = grant_target(target)?;
        let actions = actions_from_lua(actions)?;
        builder_of(&ud)?.grant(target, actions);
        Ok(ud)
      },
    );

    methods.add_function(
      "attach",
      |lua, (ud, path, opts): (LuaAnyUserData, String, Option<LuaValue>)| {
        let options: AttachmentOptions = match opts {
          None | Some(LuaValue::Nil) => AttachmentOptions::default(),
          Some(opts) => descriptor(lua, opts, "attachment options")?,
        };
        builder_of(&ud)?.attach(path, options);
        Ok(ud)
      },
    );

    methods.add_method("build", |lua, this, ()| {
      let handle = this.build().map_err(LuaError::external)?;
      handle_to_lua(lua, &handle)
    });

    methods.add_method("handle", |lua, this, ()| {
      let handle = this.resource_handle().map_err(LuaError::external)?;
      handle_to_lua(lua, &handle)
    });

    methods.add_meta_method(LuaMetaMethod::ToString, |_, this, ()| {
      Ok(format!("FunctionBuilder({})", this.identity()))
    });
  }
}
