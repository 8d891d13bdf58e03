//! Lua bindings for deployment scopes.
//!
//! ```lua
//! local admin = stack.scope("admin")
//! admin:func("users", { handler = "admin/users.handler" }):route("GET", "/users")
//! ```

use mlua::prelude::*;

use super::DeploymentScope;
use crate::function::lua::FunctionOptions;

/// Create a builder in `scope` and apply `opts` to it.
pub fn create_function(
  lua: &Lua,
  scope: &DeploymentScope,
  id: String,
  opts: Option<LuaValue>,
) -> LuaResult<LuaAnyUserData> {
  if id.trim().is_empty() {
    return Err(LuaError::external("function id must not be empty"));
  }
  let options = FunctionOptions::from_lua_value(lua, opts)?;
  let builder = scope.function(id);
  options.apply(&builder);
  lua.create_userdata(builder)
}

impl LuaUserData for DeploymentScope {
  fn add_fields<F: LuaUserDataFields<Self>>(fields: &mut F) {
    fields.add_field_method_get("id", |_, this| Ok(this.id().0.clone()));
  }

  fn add_methods<M: LuaUserDataMethods<Self>>(methods: &mut M) {
    methods.add_method("func", |lua, this, (id, opts): (String, Option<LuaValue>)| {
      create_function(lua, this, id, opts)
    });

    // Endpoint of the scope's router, or nil before any routed function is built.
    methods.add_method("endpoint", |_, this, ()| Ok(this.router().map(|r| r.endpoint)));

    methods.add_meta_method(LuaMetaMethod::ToString, |_, this, ()| {
      Ok(format!("DeploymentScope({})", this.id()))
    });
  }
}
