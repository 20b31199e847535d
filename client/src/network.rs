//! Client side of the request/reply protocol: one TCP connection per request.

use log::debug;
use serde_json::Value;
use shared::{
    read_frame, write_frame, AdminCommand, ClientCommand, Credentials, FrameError, JoinRequest,
    Reply, UpdateRequest, UserInput, WorldUpdate,
};
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpStream;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("server did not answer within {0:?}")]
    Timeout(Duration),
    #[error("server refused the request: {0}")]
    Server(String),
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ClientError>;

/// Address and credentials of one participant.
#[derive(Debug, Clone)]
pub struct ServerConnection {
    addr: String,
    credentials: Credentials,
    timeout: Duration,
}

impl ServerConnection {
    pub fn new(addr: impl Into<String>, credentials: Credentials, timeout: Duration) -> Self {
        ServerConnection {
            addr: addr.into(),
            credentials,
            timeout,
        }
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Sends one command and returns the payload of a successful reply.
    pub async fn request(&self, command: &ClientCommand) -> Result<Value> {
        let body = command.to_json()?;
        let exchange = async {
            let mut stream = TcpStream::connect(&self.addr).await?;
            write_frame(&mut stream, &body).await?;
            let reply = read_frame(&mut stream).await?;
            Ok::<_, ClientError>(reply)
        };
        let reply = tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| ClientError::Timeout(self.timeout))??;
        debug!("Received {} byte reply", reply.len());

        let reply: Reply = serde_json::from_str(&reply)?;
        reply.into_result().map_err(ClientError::Server)
    }

    /// JOINs the simulation; the payload holds the map, every session and the timer.
    pub async fn join(&self) -> Result<Value> {
        self.request(&ClientCommand::Join(JoinRequest {
            auth: self.credentials.clone(),
        }))
        .await
    }

    pub async fn update(
        &self,
        user_input: UserInput,
        render_dist: f64,
        admin_commands: Vec<AdminCommand>,
    ) -> Result<WorldUpdate> {
        let payload = self
            .request(&ClientCommand::Update(UpdateRequest {
                auth: self.credentials.clone(),
                user_input,
                render_dist,
                render_dist_extra_boats: Vec::new(),
                admin_commands,
            }))
            .await?;
        Ok(serde_json::from_value(payload)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::net::TcpListener;

    /// Answers a single connection with `reply` and hands back the request body.
    async fn one_shot_server(reply: Value) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let handle = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let request = read_frame(&mut stream).await.unwrap();
            write_frame(&mut stream, &reply.to_string()).await.unwrap();
            request
        });
        (addr, handle)
    }

    #[tokio::test]
    async fn test_join_sends_credentials() {
        let (addr, server) = one_shot_server(json!([true, {"paused": false}])).await;
        let connection = ServerConnection::new(
            addr,
            Credentials::new("alice", "pw").with_sim_password("sim"),
            Duration::from_secs(2),
        );
        let payload = connection.join().await.unwrap();
        assert_eq!(payload["paused"], json!(false));

        let request: Value = serde_json::from_str(&server.await.unwrap()).unwrap();
        assert_eq!(request, json!(["JOIN", {"auth": ["alice", "pw", "sim"]}]));
    }

    #[tokio::test]
    async fn test_server_error_is_surfaced() {
        let (addr, _server) = one_shot_server(json!([false, "nope"])).await;
        let connection =
            ServerConnection::new(addr, Credentials::new("a", "b"), Duration::from_secs(2));
        match connection.join().await {
            Err(ClientError::Server(message)) => assert_eq!(message, "nope"),
            other => panic!("Unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_update_decodes_world() {
        let world = json!([true, {
            "global-data": {"paused": false, "wind": [0.0, -5.0], "FPS": 60.0, "timer": 1.5},
            "clients": {}
        }]);
        let (addr, server) = one_shot_server(world).await;
        let connection =
            ServerConnection::new(addr, Credentials::new("a", "b"), Duration::from_secs(2));
        let update = connection
            .update(UserInput::default(), 50.0, vec![AdminCommand::Status])
            .await
            .unwrap();
        assert_eq!(update.global_data.timer, 1.5);
        assert!(update.clients.is_empty());

        let request: Value = serde_json::from_str(&server.await.unwrap()).unwrap();
        assert_eq!(request[1]["render-dist"], json!(50.0));
        assert_eq!(request[1]["admin-commands"], json!([["STATUS"]]));
    }

    #[tokio::test]
    async fn test_silent_server_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let _server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
            drop(stream);
        });
        let connection =
            ServerConnection::new(addr, Credentials::new("a", "b"), Duration::from_millis(100));
        assert!(matches!(
            connection.join().await,
            Err(ClientError::Timeout(_))
        ));
    }
}
