//! Loading stack scripts from disk and the environment.

use fnstack_lib::eval::{EvalError, evaluate_stack_from_env};
use serial_test::serial;

use super::common::{StackFile, count_provisions};

#[test]
fn evaluates_file() {
  let stack = StackFile::new(
    r#"
      stack.func("ping", { handler = "ping.handler" }):route("GET", "/ping")
    "#,
  );
  let plan = stack.eval().unwrap();
  assert!(plan.functions.contains_key("shop-test-ping"));
}

#[test]
fn stack_dir_points_at_script() {
  let stack = StackFile::new(r#"stack.func("where"):env({ DIR = stack.dir })"#);
  let plan = stack.eval().unwrap();

  let dir = &plan.functions["shop-test-where"].environment["DIR"];
  let expected = stack.temp.path().canonicalize().unwrap();
  assert_eq!(dir, &expected.to_string_lossy().to_string());
}

#[test]
fn setup_table_is_called_with_stack() {
  let stack = StackFile::new(
    r#"
      return {
        setup = function(s)
          s.func("from-setup"):handler("setup.handler")
        end,
      }
    "#,
  );
  let plan = stack.eval().unwrap();
  assert_eq!(count_provisions(&plan), 1);
  assert!(plan.functions.contains_key("shop-test-from-setup"));
}

#[test]
fn missing_file_is_a_lua_error() {
  let stack = StackFile::new("");
  std::fs::remove_file(&stack.path).unwrap();
  assert!(matches!(stack.eval(), Err(EvalError::Lua(_))));
}

mod environment {
  use super::*;

  const VARS: [&str; 4] = ["FNSTACK_APP", "FNSTACK_STAGE", "FNSTACK_MEMORY", "FNSTACK_STRICT_ROUTES"];

  fn with_env<F: FnOnce()>(set: &[(&str, &str)], f: F) {
    let vars: Vec<(&str, Option<&str>)> = VARS
      .iter()
      .map(|var| (*var, set.iter().find(|(k, _)| k == var).map(|(_, v)| *v)))
      .collect();
    temp_env::with_vars(vars, f);
  }

  #[test]
  #[serial]
  fn identity_and_defaults_come_from_environment() {
    with_env(
      &[("FNSTACK_APP", "billing"), ("FNSTACK_STAGE", "prod"), ("FNSTACK_MEMORY", "256")],
      || {
        let stack = StackFile::new(r#"stack.func("invoice"):handler("invoice.handler")"#);
        let plan = evaluate_stack_from_env(&stack.path).unwrap();
        let def = &plan.functions["billing-prod-invoice"];
        assert_eq!(def.sizing.memory_mb, 256);
      },
    );
  }

  #[test]
  #[serial]
  fn strict_routes_reject_second_route() {
    let source = r#"stack.func("moved"):route("GET", "/old"):route("GET", "/new")"#;

    with_env(&[], || {
      let stack = StackFile::new(source);
      let plan = evaluate_stack_from_env(&stack.path).unwrap();
      assert_eq!(plan.routers["main"].routes[0].path, "/new");
    });

    with_env(&[("FNSTACK_STRICT_ROUTES", "true")], || {
      let stack = StackFile::new(source);
      let err = evaluate_stack_from_env(&stack.path).unwrap_err();
      assert!(err.to_string().contains("already has a route"), "unexpected error: {}", err);
    });
  }

  #[test]
  #[serial]
  fn invalid_environment_is_a_config_error() {
    with_env(&[("FNSTACK_MEMORY", "plenty")], || {
      let stack = StackFile::new("");
      assert!(matches!(
        evaluate_stack_from_env(&stack.path),
        Err(EvalError::Config(_))
      ));
    });
  }
}
