use lambda_alb_proxy::async_trait::async_trait;
use lambda_alb_proxy::{App, HeaderName, HeaderValue, LambdaContext, Method, RequestCtx, StatusCode};
use log::info;
use thiserror::Error;

/// Header echoed back by the `/echo` route.
pub const TRACE_HEADER: HeaderName = HeaderName::from_static("x-trace");

/// Example handler error type.
#[derive(Debug, Error)]
pub enum HandlerError {
  #[error("method `{0}` not allowed")]
  MethodNotAllowed(Method),
  #[error("missing query param `{0}`")]
  MissingQueryParam(&'static str),
  #[error("no route for `{0}`")]
  NotFound(String),
}

impl HandlerError {
  fn status_code(&self) -> StatusCode {
    match self {
      HandlerError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
      HandlerError::MissingQueryParam(_) => StatusCode::BAD_REQUEST,
      HandlerError::NotFound(_) => StatusCode::NOT_FOUND,
    }
  }
}

/// Example app with a handful of routes:
///  * `GET /ping` responds with `pong`.
///  * `POST /echo` responds with the request body and every `X-Trace` request header.
///  * `GET /greet?name=...` responds with a greeting.
///  * `GET /whoami` responds with the client IP and the Lambda request ID.
pub struct PingApp {
  // Store any app state (e.g., DB client) here.
  _state: (),
}

impl PingApp {
  pub fn new(state: ()) -> Self {
    Self { _state: state }
  }

  fn route(&self, ctx: &mut RequestCtx<'_>) -> Result<(), HandlerError> {
    let request = ctx.request();
    let method = request.method();
    match request.path() {
      "/ping" if *method == Method::GET => {
        ctx.set_body("pong");
      }
      "/echo" if *method == Method::POST => {
        for trace in request.headers().get_all(&TRACE_HEADER) {
          ctx
            .response_mut()
            .add_header(TRACE_HEADER, trace.clone());
        }
        ctx.set_body(request.body().to_vec());
      }
      "/greet" if *method == Method::GET => {
        let name = request
          .query()
          .into_iter()
          .flat_map(|query| query.split('&'))
          .find_map(|pair| pair.strip_prefix("name="))
          .filter(|name| !name.is_empty())
          .ok_or(HandlerError::MissingQueryParam("name"))?;
        ctx.set_body(format!("Hello, {name}!"));
      }
      "/whoami" if *method == Method::GET => {
        let request_id = request
          .extensions()
          .get::<LambdaContext>()
          .map(|context| context.request_id.as_str())
          .unwrap_or("-");
        let body = format!("{} {request_id}", ctx.remote_ip());
        ctx.set_body(body);
      }
      "/ping" | "/echo" | "/greet" | "/whoami" => {
        return Err(HandlerError::MethodNotAllowed(method.clone()));
      }
      path => return Err(HandlerError::NotFound(path.to_string())),
    }

    Ok(())
  }
}

#[async_trait]
impl App for PingApp {
  async fn handle(&self, ctx: &mut RequestCtx<'_>) {
    if let Err(err) = self.route(ctx) {
      info!("Responding with error: {err}");
      ctx.set_status(err.status_code());
      ctx.set_header(
        HeaderName::from_static("content-type"),
        HeaderValue::from_static("text/plain; charset=utf-8"),
      );
      ctx.set_body(err.to_string());
    }
  }
}
