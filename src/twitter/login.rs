//! Credential login through the onboarding task flow.
//!
//! The platform drives login as a sequence of subtasks. Each response names the
//! next subtask and carries a flow token that must be echoed back with the answer.

use log::{debug, info, warn};
use serde_json::{json, Value};

use super::api::WebScraper;
use super::ScraperError;

const TASK_URL: &str = "https://api.x.com/1.1/onboarding/task.json";
const MAX_FLOW_STEPS: usize = 12;

/// Where the flow stands after one round trip.
#[derive(Debug, PartialEq)]
pub(crate) enum FlowStep {
    Next { flow_token: String, subtask_id: String },
    Done,
}

impl WebScraper {
    pub(crate) async fn run_login_flow(
        &self,
        username: &str,
        password: &str,
        email: Option<&str>,
    ) -> Result<(), ScraperError> {
        info!("Starting login flow for @{}", username);

        // A stale session would otherwise leak its cookies into the flow
        {
            let mut state = self.state.lock().await;
            state.cookies.clear();
            state.guest_token = None;
        }
        self.activate_guest_token().await?;

        let start = json!({
            "flow_token": null,
            "input_flow_data": {
                "flow_context": {
                    "debug_overrides": {},
                    "start_location": { "location": "unknown" }
                }
            }
        });
        let mut step = self
            .post_flow(&format!("{}?flow_name=login", TASK_URL), &start)
            .await?;

        for _ in 0..MAX_FLOW_STEPS {
            let (flow_token, subtask_id) = match step {
                FlowStep::Done => {
                    return self.finish_login(username).await;
                }
                FlowStep::Next {
                    flow_token,
                    subtask_id,
                } => (flow_token, subtask_id),
            };

            debug!("Login flow subtask: {}", subtask_id);
            let input = subtask_input(&subtask_id, username, password, email)?;
            if input.is_null() {
                return self.finish_login(username).await;
            }

            let body = json!({
                "flow_token": flow_token,
                "subtask_inputs": [input],
            });
            step = self.post_flow(TASK_URL, &body).await?;
        }

        warn!("Login flow did not finish within {} steps", MAX_FLOW_STEPS);
        Err(ScraperError::Login(format!(
            "flow did not finish within {} steps",
            MAX_FLOW_STEPS
        )))
    }

    async fn post_flow(&self, url: &str, body: &Value) -> Result<FlowStep, ScraperError> {
        let request_builder = self.client.post(url).json(body);
        let json = self.send_request(request_builder, "login_flow").await?;
        parse_flow_step(&json)
    }

    async fn finish_login(&self, username: &str) -> Result<(), ScraperError> {
        if self.state.lock().await.is_logged_in() {
            info!("Login flow completed for @{}", username);
            Ok(())
        } else {
            Err(ScraperError::Login(
                "flow completed without an auth_token cookie".to_string(),
            ))
        }
    }
}

pub(crate) fn parse_flow_step(json: &Value) -> Result<FlowStep, ScraperError> {
    if json.get("status").and_then(|s| s.as_str()) == Some("success")
        && json
            .get("subtasks")
            .and_then(|s| s.as_array())
            .map_or(true, |s| s.is_empty())
    {
        return Ok(FlowStep::Done);
    }

    let flow_token = json
        .get("flow_token")
        .and_then(|v| v.as_str())
        .ok_or_else(|| ScraperError::Login("response carried no flow_token".to_string()))?;

    let subtask_id = json
        .get("subtasks")
        .and_then(|s| s.get(0))
        .and_then(|s| s.get("subtask_id"))
        .and_then(|v| v.as_str());

    match subtask_id {
        Some(subtask_id) => Ok(FlowStep::Next {
            flow_token: flow_token.to_string(),
            subtask_id: subtask_id.to_string(),
        }),
        None => Ok(FlowStep::Done),
    }
}

/// Builds the answer for one subtask. `Value::Null` marks a terminal success subtask.
pub(crate) fn subtask_input(
    subtask_id: &str,
    username: &str,
    password: &str,
    email: Option<&str>,
) -> Result<Value, ScraperError> {
    let input = match subtask_id {
        "LoginJsInstrumentationSubtask" => json!({
            "subtask_id": subtask_id,
            "js_instrumentation": { "response": "{}", "link": "next_link" }
        }),
        "LoginEnterUserIdentifierSSO" => json!({
            "subtask_id": subtask_id,
            "settings_list": {
                "setting_responses": [{
                    "key": "user_identifier",
                    "response_data": { "text_data": { "result": username } }
                }],
                "link": "next_link"
            }
        }),
        "LoginEnterPassword" => json!({
            "subtask_id": subtask_id,
            "enter_password": { "password": password, "link": "next_link" }
        }),
        "AccountDuplicationCheck" => json!({
            "subtask_id": subtask_id,
            "check_logged_in_account": { "link": "AccountDuplicationCheck_false" }
        }),
        "LoginEnterAlternateIdentifierSubtask" | "LoginAcid" => {
            let email = email.ok_or_else(|| {
                ScraperError::Login(format!("{} requires an email address", subtask_id))
            })?;
            json!({
                "subtask_id": subtask_id,
                "enter_text": { "text": email, "link": "next_link" }
            })
        }
        "LoginSuccessSubtask" => Value::Null,
        "DenyLoginSubtask" => {
            return Err(ScraperError::Login("login was denied".to_string()));
        }
        "LoginTwoFactorAuthChallenge" => {
            return Err(ScraperError::Login(
                "two-factor authentication is not supported".to_string(),
            ));
        }
        other => {
            return Err(ScraperError::Login(format!("unknown subtask {}", other)));
        }
    };
    Ok(input)
}
