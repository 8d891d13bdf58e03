//! The `stack` global table.
//!
//! - `stack.app`, `stack.stage`, `stack.region` - deployment configuration
//! - `stack.scope(name)` - a deployment scope; scopes with one name share singletons
//! - `stack.func(id, opts?)` - a function builder in the default scope
//! - `stack.finalize()` - run scheduled finalizes now, returns how many ran

use std::rc::Rc;

use mlua::prelude::*;

use crate::consts::STACK_GLOBAL;
use crate::scope::App;
use crate::scope::lua::create_function;

/// Register the `stack` global table for `app`.
pub fn register_globals(lua: &Lua, app: Rc<App>) -> LuaResult<()> {
  let stack = lua.create_table()?;

  let config = app.config();
  stack.set("app", config.app.as_str())?;
  stack.set("stage", config.stage.as_str())?;
  stack.set("region", config.region.as_str())?;

  let scope_app = app.clone();
  let scope = lua.create_function(move |_, name: String| {
    if name.trim().is_empty() {
      return Err(LuaError::external("scope name must not be empty"));
    }
    Ok(scope_app.scope(name))
  })?;
  stack.set("scope", scope)?;

  let func_app = app.clone();
  let func = lua.create_function(move |lua, (id, opts): (String, Option<LuaValue>)| {
    create_function(lua, &func_app.default_scope(), id, opts)
  })?;
  stack.set("func", func)?;

  let finalize = lua.create_function(move |_, ()| app.run_pending().map_err(LuaError::external))?;
  stack.set("finalize", finalize)?;

  lua.globals().set(STACK_GLOBAL, stack)?;

  Ok(())
}
