//! Shared singletons across functions and scopes.

use fnstack_lib::eval::EvalError;
use fnstack_lib::function::BuildError;

use super::common::{eval, eval_err, ops};

mod routers {
  use super::*;

  #[test]
  fn functions_in_one_scope_share_router() {
    let plan = eval(
      r#"
        local api = stack.scope("api")
        api:func("list"):route("GET", "/items")
        api:func("create"):route("POST", "/items")
        stack.scope("api"):func("delete"):route("DELETE", "/items/{id}")
      "#,
    );

    assert_eq!(plan.routers.len(), 1);
    let routes: Vec<_> = plan.routers["api"].routes.iter().map(|r| r.target.as_str()).collect();
    assert_eq!(
      routes,
      vec!["shop-test-api-list", "shop-test-api-create", "shop-test-api-delete"]
    );
    assert_eq!(ops(&plan).iter().filter(|op| op.starts_with("router:")).count(), 1);
  }

  #[test]
  fn scopes_get_distinct_routers() {
    let plan = eval(
      r#"
        stack.scope("public"):func("ping"):route("GET", "/ping")
        stack.scope("admin"):func("ping"):route("GET", "/ping")
      "#,
    );

    assert_eq!(plan.routers.len(), 2);
    assert_ne!(plan.routers["public"].endpoint, plan.routers["admin"].endpoint);
  }

  #[test]
  fn endpoint_is_visible_after_build() {
    eval(
      r#"
        local api = stack.scope("api")
        assert(api:endpoint() == nil)
        api:func("ping"):route("GET", "/ping"):build()
        assert(api:endpoint():find("execute%-api"), api:endpoint())
      "#,
    );
  }

  #[test]
  fn duplicate_route_in_scope_fails() {
    let err = eval_err(
      r#"
        stack.func("a"):route("GET", "/same")
        stack.func("b"):route("get", "/same")
      "#,
    );
    assert!(
      matches!(err, EvalError::Build(BuildError::Routing(_))),
      "unexpected error: {}",
      err
    );
  }

  #[test]
  fn route_path_is_validated() {
    let err = eval_err(r#"stack.func("a"):route("GET", "no-slash")"#);
    assert!(err.to_string().contains("no-slash"), "unexpected error: {}", err);
  }
}

mod attachments {
  use super::*;

  #[test]
  fn attachment_created_once_and_attached_to_each() {
    let plan = eval(
      r#"
        stack.func("a"):attach("layers/common", { description = "shared deps" })
        stack.func("b"):attach("layers/common")
      "#,
    );

    assert_eq!(plan.attachments.len(), 1);
    let (arn, def) = plan.attachments.iter().next().unwrap();
    assert_eq!(def.options.description.as_deref(), Some("shared deps"));
    assert_eq!(plan.functions["shop-test-a"].attachments, vec![arn.clone()]);
    assert_eq!(plan.functions["shop-test-b"].attachments, vec![arn.clone()]);
  }

  #[test]
  fn each_scope_has_its_own_attachment() {
    let plan = eval(
      r#"
        stack.scope("one"):func("a"):attach("layers/common")
        stack.scope("two"):func("a"):attach("layers/common")
      "#,
    );
    assert_eq!(plan.attachments.len(), 2);
  }
}
