use aws_lambda_events::alb::AlbTargetGroupRequest;
use serde_json::{json, Value};

/// Build an ALB event from a typical `GET /` request, replacing the top-level fields present in
/// `overrides`.
pub(crate) fn alb_event(overrides: Value) -> AlbTargetGroupRequest {
  let mut event = json!({
    "requestContext": {
      "elb": {
        "targetGroupArn":
          "arn:aws:elasticloadbalancing:us-east-1:123456789012:targetgroup/lambda-target/abc123"
      }
    },
    "httpMethod": "GET",
    "path": "/",
    "queryStringParameters": {},
    "multiValueQueryStringParameters": {},
    "headers": {
      "accept": "*/*",
      "host": "api.example.com",
      "user-agent": "curl/8.4.0",
      "x-amzn-trace-id": "Root=1-65a1b2c3-0123456789abcdef01234567",
      "x-forwarded-for": "203.0.113.7",
      "x-forwarded-port": "443",
      "x-forwarded-proto": "https"
    },
    "multiValueHeaders": {},
    "body": "",
    "isBase64Encoded": false
  });

  let fields = event.as_object_mut().expect("event should be an object");
  for (key, value) in overrides
    .as_object()
    .expect("overrides should be an object")
  {
    fields.insert(key.clone(), value.clone());
  }

  serde_json::from_value(event).unwrap_or_else(|err| panic!("invalid ALB event: {err}"))
}
