use std::path::Path;
use std::rc::Rc;

use mlua::prelude::*;

use crate::consts::STACK_GLOBAL;
use crate::lua::globals;
use crate::scope::App;

/// Create a new Lua runtime with the `stack` global registered for `app`.
///
/// `require` additionally searches `./lua/` so stacks can share modules.
pub fn create_runtime(app: Rc<App>) -> LuaResult<Lua> {
  let lua = Lua::new();
  let package_path = lua.globals().get::<LuaTable>("package")?.get::<String>("path")?;
  let new_package_path = format!("./lua/?.lua;./lua/?/init.lua;{}", package_path);
  lua
    .globals()
    .get::<LuaTable>("package")?
    .set("path", new_package_path)?;

  globals::register_globals(&lua, app)?;

  Ok(lua)
}

/// Load and execute a stack script.
/// Sets `stack.dir` to the directory of the loaded file.
/// Returns the value of the script's explicit `return`, or nil.
pub fn load_file(lua: &Lua, path: &Path) -> LuaResult<LuaValue> {
  let canonical_path = path
    .canonicalize()
    .map_err(|e| LuaError::external(format!("cannot canonicalize '{}': {}", path.display(), e)))?;
  let content = std::fs::read_to_string(&canonical_path)
    .map_err(|e| LuaError::external(format!("cannot read '{}': {}", canonical_path.display(), e)))?;

  let stack = lua.globals().get::<LuaTable>(STACK_GLOBAL)?;
  stack.set(
    "dir",
    canonical_path
      .parent()
      .unwrap_or(Path::new(""))
      .to_string_lossy()
      .to_string(),
  )?;

  lua
    .load(&content)
    .set_name(format!("@{}", canonical_path.display()))
    .call::<LuaValue>(())
}

/// Execute an in-memory stack script named `name`.
pub fn load_source(lua: &Lua, name: &str, source: &str) -> LuaResult<LuaValue> {
  lua.load(source).set_name(format!("={}", name)).call::<LuaValue>(())
}

/// Run the optional entry point a script returned: a function, or a table
/// with a `setup` function. Either is called with the `stack` table.
pub fn run_setup(lua: &Lua, returned: LuaValue) -> LuaResult<()> {
  let setup = match returned {
    LuaValue::Nil => return Ok(()),
    LuaValue::Function(f) => f,
    LuaValue::Table(t) => match t.get::<Option<LuaFunction>>("setup")? {
      Some(f) => f,
      None => return Ok(()),
    },
    other => {
      return Err(LuaError::external(format!(
        "stack script must return nothing, a function or a table with 'setup', got {}",
        other.type_name()
      )));
    }
  };
  let stack = lua.globals().get::<LuaTable>(STACK_GLOBAL)?;
  setup.call::<()>(stack)
}
