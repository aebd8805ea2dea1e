use anyhow::Context as _;
use serde::Deserialize;
use url::Url;

use crate::app::remote::RemoteServices;
use crate::formats::{BrowserRecord, GraphqlRequest};

const LIST_RECORDS: &str = "query AllPokemons {
  allPokemons(first: 1000) {
    edges { node { id name url } }
  }
}";

const CREATE_RECORD: &str = "mutation CreatePokemon($name: String!, $url: String!) {
  createPokemon(name: $name, url: $url) { id name url }
}";

const UPDATE_RECORD: &str = "mutation UpdatePokemon($id: ID!, $name: String!, $url: String!) {
  updatePokemon(id: $id, name: $name, url: $url) { id name url }
}";

const DELETE_RECORD: &str = "mutation DeletePokemon($id: ID!) {
  deletePokemon(id: $id) { id }
}";

#[derive(Debug, Deserialize)]
struct Connection {
    edges: Vec<Edge>,
}

#[derive(Debug, Deserialize)]
struct Edge {
    node: BrowserRecord,
}

#[derive(Debug, Deserialize)]
struct Deleted {
    id: String,
}

/// Record browser over a reader's claimed endpoint.
pub struct DataBrowser<'a> {
    remote: &'a dyn RemoteServices,
    endpoint: Url,
}

impl<'a> DataBrowser<'a> {
    pub fn new(remote: &'a dyn RemoteServices, endpoint: Url) -> Self {
        Self { remote, endpoint }
    }

    pub async fn list_records(&self) -> anyhow::Result<Vec<BrowserRecord>> {
        let data = self.execute(LIST_RECORDS, "AllPokemons", None).await?;
        let connection: Connection = field(data, "allPokemons")?;
        Ok(connection.edges.into_iter().map(|edge| edge.node).collect())
    }

    pub async fn create_record(&self, name: &str, url: &str) -> anyhow::Result<BrowserRecord> {
        let variables = serde_json::json!({ "name": name, "url": url });
        let data = self
            .execute(CREATE_RECORD, "CreatePokemon", Some(variables))
            .await?;
        field(data, "createPokemon")
    }

    pub async fn update_record(
        &self,
        id: &str,
        name: &str,
        url: &str,
    ) -> anyhow::Result<BrowserRecord> {
        let variables = serde_json::json!({ "id": id, "name": name, "url": url });
        let data = self
            .execute(UPDATE_RECORD, "UpdatePokemon", Some(variables))
            .await?;
        field(data, "updatePokemon")
    }

    /// Returns the id of the deleted record.
    pub async fn delete_record(&self, id: &str) -> anyhow::Result<String> {
        let data = self
            .execute(
                DELETE_RECORD,
                "DeletePokemon",
                Some(serde_json::json!({ "id": id })),
            )
            .await?;
        let deleted: Deleted = field(data, "deletePokemon")?;
        Ok(deleted.id)
    }

    async fn execute(
        &self,
        query: &str,
        operation_name: &str,
        variables: Option<serde_json::Value>,
    ) -> anyhow::Result<serde_json::Value> {
        let request = GraphqlRequest {
            query: query.to_owned(),
            variables,
            operation_name: Some(operation_name.to_owned()),
        };
        let envelope = self
            .remote
            .graphql(&self.endpoint, &request)
            .await
            .with_context(|| format!("{operation_name} against {}", self.endpoint))?;
        into_data(envelope)
    }
}

/// Unwraps a GraphQL response envelope; any `errors` entry fails the call.
fn into_data(mut envelope: serde_json::Value) -> anyhow::Result<serde_json::Value> {
    if let Some(errors) = envelope.get("errors").and_then(|v| v.as_array())
        && !errors.is_empty()
    {
        let messages: Vec<&str> = errors
            .iter()
            .map(|e| e.get("message").and_then(|m| m.as_str()).unwrap_or("unknown error"))
            .collect();
        anyhow::bail!("graphql errors: {}", messages.join("; "));
    }
    match envelope.get_mut("data").map(serde_json::Value::take) {
        Some(data) if !data.is_null() => Ok(data),
        _ => anyhow::bail!("graphql response has no data"),
    }
}

fn field<T: serde::de::DeserializeOwned>(
    mut data: serde_json::Value,
    name: &str,
) -> anyhow::Result<T> {
    let value = data
        .get_mut(name)
        .map(serde_json::Value::take)
        .with_context(|| format!("graphql response is missing `{name}`"))?;
    serde_json::from_value(value).with_context(|| format!("parse `{name}`"))
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::formats::UserData;

    struct CannedGraphql {
        response: serde_json::Value,
        seen: Mutex<Vec<GraphqlRequest>>,
    }

    impl CannedGraphql {
        fn new(response: serde_json::Value) -> Self {
            Self {
                response,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl RemoteServices for CannedGraphql {
        async fn exchange_code(&self, _code: &str) -> anyhow::Result<UserData> {
            anyhow::bail!("not used")
        }

        async fn invite(&self, _email: &str) -> anyhow::Result<()> {
            anyhow::bail!("not used")
        }

        async fn graphql(
            &self,
            _endpoint: &Url,
            request: &GraphqlRequest,
        ) -> anyhow::Result<serde_json::Value> {
            self.seen.lock().unwrap().push(request.clone());
            Ok(self.response.clone())
        }
    }

    fn endpoint() -> Url {
        Url::parse("https://api.graph.cool/simple/v1/cixyz").unwrap()
    }

    #[tokio::test]
    async fn list_records_flattens_edges() {
        let remote = CannedGraphql::new(serde_json::json!({
            "data": { "allPokemons": { "edges": [
                { "node": { "id": "1", "name": "Pikachu", "url": "https://img/p.png" } },
                { "node": { "id": "2", "name": "Bulbasaur", "url": "https://img/b.png" } }
            ] } }
        }));
        let records = DataBrowser::new(&remote, endpoint()).list_records().await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].name, "Bulbasaur");

        let seen = remote.seen.lock().unwrap();
        assert!(seen[0].query.contains("allPokemons(first: 1000)"));
        assert_eq!(seen[0].operation_name.as_deref(), Some("AllPokemons"));
    }

    #[tokio::test]
    async fn create_record_sends_variables() {
        let remote = CannedGraphql::new(serde_json::json!({
            "data": { "createPokemon": { "id": "3", "name": "Mew", "url": "https://img/m.png" } }
        }));
        let record = DataBrowser::new(&remote, endpoint())
            .create_record("Mew", "https://img/m.png")
            .await
            .unwrap();
        assert_eq!(record.id, "3");

        let seen = remote.seen.lock().unwrap();
        assert_eq!(
            seen[0].variables,
            Some(serde_json::json!({ "name": "Mew", "url": "https://img/m.png" }))
        );
    }

    #[tokio::test]
    async fn delete_record_returns_id() {
        let remote = CannedGraphql::new(serde_json::json!({
            "data": { "deletePokemon": { "id": "3" } }
        }));
        let id = DataBrowser::new(&remote, endpoint()).delete_record("3").await.unwrap();
        assert_eq!(id, "3");
    }

    #[tokio::test]
    async fn graphql_errors_fail_the_call() {
        let remote = CannedGraphql::new(serde_json::json!({
            "data": null,
            "errors": [{ "message": "Insufficient permissions" }]
        }));
        let err = DataBrowser::new(&remote, endpoint())
            .update_record("1", "Raichu", "https://img/r.png")
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("Insufficient permissions"));
    }
}
