//! Deferred finalization as seen from stack scripts.

use fnstack_lib::consts::{DEFAULT_MEMORY_MB, DEFAULT_TIMEOUT_SECS};
use fnstack_lib::eval::EvalError;
use fnstack_lib::function::BuildError;

use super::common::{count_provisions, eval, eval_err, ops};

mod finalize_once {
  use super::*;

  #[test]
  fn long_chain_provisions_once() {
    let plan = eval(
      r#"
        stack.func("orders")
          :handler("src/orders.handler")
          :sizing({ memory = 512 })
          :sizing({ timeout = 30 })
          :env({ TABLE = "orders" })
          :env({ REGION = stack.region })
          :on_topic("order-events")
          :on_schedule("rate(1 hour)")
      "#,
    );

    assert_eq!(count_provisions(&plan), 1);
    let def = &plan.functions["shop-test-orders"];
    assert_eq!(def.sizing.memory_mb, 512);
    assert_eq!(def.sizing.timeout_secs, 30);
    assert_eq!(def.environment.len(), 2);
    assert_eq!(def.handler.as_deref(), Some("src/orders.handler"));
  }

  #[test]
  fn separate_statements_on_one_builder_provision_once() {
    let plan = eval(
      r#"
        local f = stack.func("split")
        f:handler("split.handler")
        f:on_topic("a")
        f:on_topic("b")
      "#,
    );
    assert_eq!(count_provisions(&plan), 1);
    assert_eq!(plan.functions["shop-test-split"].triggers.len(), 2);
  }

  #[test]
  fn explicit_build_suppresses_deferred_finalize() {
    let plan = eval(
      r#"
        local f = stack.func("eager"):handler("eager.handler")
        local first = f:build()
        local second = f:on_topic("late"):build()
        assert(first.arn == second.arn)
        assert(f.built)
      "#,
    );

    assert_eq!(count_provisions(&plan), 1);
    assert!(plan.functions["shop-test-eager"].triggers.is_empty());
  }

  #[test]
  fn handle_without_configuration_uses_defaults() {
    let plan = eval(
      r#"
        local h = stack.func("bare"):handle()
        assert(h.identity == "shop-test-bare", h.identity)
        assert(getmetatable(h).__type == "FunctionHandle")
      "#,
    );

    let def = &plan.functions["shop-test-bare"];
    assert_eq!(def.sizing.memory_mb, DEFAULT_MEMORY_MB);
    assert_eq!(def.sizing.timeout_secs, DEFAULT_TIMEOUT_SECS);
    assert_eq!(count_provisions(&plan), 1);
  }

  #[test]
  fn builder_never_configured_is_not_deployed() {
    let plan = eval(r#"local unused = stack.func("unused")"#);
    assert!(plan.functions.is_empty());
  }
}

mod errors {
  use super::*;

  #[test]
  fn deferred_error_surfaces_after_script() {
    let err = eval_err(
      r#"
        stack.func("ok"):handler("ok.handler")
        stack.func("broken"):sizing({ memory = 64 })
        stack.func("never"):handler("never.handler")
      "#,
    );
    match err {
      EvalError::Build(BuildError::Provisioning(e)) => {
        assert!(e.to_string().contains("shop-test-broken"), "unexpected error: {}", e)
      }
      other => panic!("expected provisioning error, got {}", other),
    }
  }

  #[test]
  fn explicit_build_error_can_be_caught_in_lua() {
    let plan = eval(
      r#"
        local ok, err = pcall(function()
          return stack.func("broken"):sizing({ memory = 64 }):build()
        end)
        assert(not ok)
        assert(tostring(err):find("memory"), tostring(err))

        -- Poisoned: the deferred finalize does not retry it.
        stack.func("fine"):handler("fine.handler")
      "#,
    );

    assert_eq!(ops(&plan), vec!["provision:shop-test-fine"]);
  }

  #[test]
  fn poisoned_builder_reports_previous_failure() {
    let plan = eval(
      r#"
        local f = stack.func("broken"):sizing({ memory = 64 })
        pcall(f.build, f)
        local ok, err = pcall(f.handle, f)
        assert(not ok)
        assert(tostring(err):find("previously failed"), tostring(err))
      "#,
    );
    assert!(plan.functions.is_empty());
  }
}
