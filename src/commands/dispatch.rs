use crate::config::ProjectConfig;
use crate::context::Context;
use crate::dispatch::{AgentDispatch, CreateDispatchRequest, DispatchClient};
use crate::output;
use anyhow::{Result, bail};
use uuid::Uuid;

/// Handles the 'dispatch' command group - remote CRUD over agent dispatches
pub struct DispatchCommand;

impl DispatchCommand {
    pub fn list(ctx: &Context, project: &ProjectConfig, room: &str, json: bool) -> Result<()> {
        if room.is_empty() {
            bail!("room name is required");
        }

        let client = DispatchClient::new(&*ctx.http, project)?;
        let dispatches = client.list(room, None)?;
        Self::print_dispatches(&dispatches, json);
        Ok(())
    }

    pub fn get(
        ctx: &Context,
        project: &ProjectConfig,
        room: &str,
        id: &str,
        json: bool,
    ) -> Result<()> {
        if room.is_empty() {
            bail!("room name is required");
        }
        if id.is_empty() {
            bail!("dispatch ID is required");
        }

        let client = DispatchClient::new(&*ctx.http, project)?;
        let dispatches = client.list(room, Some(id))?;
        Self::print_dispatches(&dispatches, json);
        Ok(())
    }

    pub fn create(
        ctx: &Context,
        project: &ProjectConfig,
        room: Option<&str>,
        new_room: bool,
        agent_name: Option<&str>,
        metadata: Option<&str>,
        json: bool,
    ) -> Result<()> {
        let room = if new_room {
            format!("room-{}", Uuid::new_v4())
        } else {
            room.unwrap_or("").to_string()
        };
        if room.is_empty() {
            bail!("room or --new-room is required");
        }
        let agent_name = agent_name.unwrap_or("");
        if agent_name.is_empty() {
            bail!("agent-name is required");
        }

        let client = DispatchClient::new(&*ctx.http, project)?;
        let created = client.create(&CreateDispatchRequest {
            room: &room,
            agent_name,
            metadata: metadata.unwrap_or(""),
        })?;

        if json {
            println!("{}", serde_json::to_string_pretty(&created)?);
        } else {
            ctx.output
                .success(&format!("Dispatch created: {}", created.id));
            ctx.output.key_value("Room", &created.room);
            ctx.output.key_value("Agent", &created.agent_name);
        }
        Ok(())
    }

    pub fn delete(
        ctx: &Context,
        project: &ProjectConfig,
        room: &str,
        id: &str,
        json: bool,
    ) -> Result<()> {
        if room.is_empty() {
            bail!("room name is required");
        }
        if id.is_empty() {
            bail!("dispatch ID is required");
        }

        let client = DispatchClient::new(&*ctx.http, project)?;
        let deleted = client.delete(room, id)?;

        if json {
            println!("{}", serde_json::to_string_pretty(&deleted)?);
        } else {
            ctx.output
                .success(&format!("Dispatch deleted: {}", deleted.id));
        }
        Ok(())
    }

    fn print_dispatches(dispatches: &[AgentDispatch], json: bool) {
        if json {
            match serde_json::to_string_pretty(dispatches) {
                Ok(rendered) => println!("{}", rendered),
                Err(err) => output::error(&format!("Failed to render JSON: {}", err)),
            }
            return;
        }

        let rows: Vec<Vec<String>> = dispatches
            .iter()
            .map(|d| {
                vec![
                    d.id.clone(),
                    d.room.clone(),
                    d.agent_name.clone(),
                    d.metadata.clone(),
                ]
            })
            .collect();
        output::table(&["DispatchID", "Room", "AgentName", "Metadata"], &rows);
    }
}
