//! Application order of recorded configuration.

use super::common::{eval, ops};

#[test]
fn route_topics_and_grant_in_fixed_order() {
  let plan = eval(
    r#"
      stack.func("api")
        :route("GET", "/x")
        :add_trigger("topic-subscription", { topic = "d1-first" })
        :add_trigger("permission-grant", { target_arn = "arn:aws:dynamodb:us-east-1:000000000000:table/t", actions = { "dynamodb:GetItem" } })
        :add_trigger("topic-subscription", { topic = "d1-second" })
    "#,
  );

  assert_eq!(
    ops(&plan),
    vec![
      "provision:shop-test-api",
      "router:main",
      "route:GET /x:shop-test-api",
      "topic-subscription:d1-first",
      "topic-subscription:d1-second",
      "grant:arn:aws:dynamodb:us-east-1:000000000000:table/t",
    ]
  );
}

#[test]
fn every_kind_in_apply_order() {
  let plan = eval(
    r#"
      stack.func("all")
        :on_schedule("cron(0 12 * * ? *)")
        :grant("arn:aws:s3:::reports", { "s3:PutObject" })
        :on_stream({ stream = "clicks", starting_position = "trim_horizon" })
        :on_bucket({ bucket = "uploads", events = { "s3:ObjectRemoved:*" } })
        :on_queue("jobs")
        :on_topic("events")
        :attach("layers/common")
    "#,
  );

  assert_eq!(
    ops(&plan),
    vec![
      "provision:shop-test-all",
      "attachment:layers/common",
      "attach:shop-test-all",
      "topic-subscription:events",
      "queue-subscription:jobs",
      "blob-notification:uploads",
      "streaming-source:clicks",
      "grant:arn:aws:s3:::reports",
      "grant:arn:aws:sqs:us-east-1:000000000000:jobs",
      "scheduled-rule:cron(0 12 * * ? *)",
    ]
  );
}

#[test]
fn environment_merges_across_calls() {
  let plan = eval(
    r#"
      stack.func("env")
        :env({ A = "1" })
        :env({ B = "2" })
        :env({ A = "3" })
    "#,
  );

  let env = &plan.functions["shop-test-env"].environment;
  assert_eq!(env.get("A").map(String::as_str), Some("3"));
  assert_eq!(env.get("B").map(String::as_str), Some("2"));
  assert_eq!(env.len(), 2);
}

#[test]
fn functions_finalize_in_configuration_order() {
  let plan = eval(
    r#"
      stack.func("first"):handler("a.h")
      stack.func("second"):handler("b.h")
      stack.func("first-again-by-name"):name("shop-test-third"):handler("c.h")
    "#,
  );

  let provisioned: Vec<String> = ops(&plan).into_iter().filter(|op| op.starts_with("provision:")).collect();
  assert_eq!(
    provisioned,
    vec!["provision:shop-test-first", "provision:shop-test-second", "provision:shop-test-third"]
  );
}
