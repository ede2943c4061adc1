use chronicle_shared::models::{DateKey, MapId, NewPin, Pin, PinDate, PinId, PinPatch, Visibility};
use chronicle_shared::pin_store::PinRepository;
use serde::{Deserialize, Serialize};

const PIN_FIELDS: &str = "id x y title notes relatedArticleId visibility dateKey dateLabel";

/// Build the variables JSON for a createPin mutation.
pub fn build_create_pin_variables(map_id: &MapId, pin: &NewPin) -> serde_json::Value {
    serde_json::json!({
        "input": {
            "mapId": map_id,
            "x": pin.x,
            "y": pin.y,
            "title": pin.title,
            "notes": pin.notes,
            "relatedArticleId": pin.related_article_id,
            "visibility": pin.visibility,
            "dateKey": pin.date.as_ref().map(|d| d.key.0),
            "dateLabel": pin.date.as_ref().map(|d| d.label.as_str()),
        }
    })
}

/// Build the variables JSON for an updatePin mutation. Untouched fields are
/// left out; cleared fields are sent as `null`.
pub fn build_update_pin_variables(id: &PinId, patch: &PinPatch) -> serde_json::Value {
    let mut input = serde_json::Map::new();
    if let Some(x) = patch.x {
        input.insert("x".into(), x.into());
    }
    if let Some(y) = patch.y {
        input.insert("y".into(), y.into());
    }
    if let Some(title) = &patch.title {
        input.insert("title".into(), title.clone().into());
    }
    if let Some(notes) = &patch.notes {
        input.insert("notes".into(), serde_json::json!(notes));
    }
    if let Some(article) = &patch.related_article_id {
        input.insert("relatedArticleId".into(), serde_json::json!(article));
    }
    if let Some(visibility) = patch.visibility {
        input.insert("visibility".into(), serde_json::json!(visibility));
    }
    if let Some(date) = &patch.date {
        input.insert("dateKey".into(), serde_json::json!(date.as_ref().map(|d| d.key.0)));
        input.insert("dateLabel".into(), serde_json::json!(date.as_ref().map(|d| &d.label)));
    }
    serde_json::json!({ "id": id, "input": input })
}

#[derive(Debug, Clone, Serialize)]
pub struct GraphQLRequest {
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variables: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GraphQLResponse<T> {
    pub data: Option<T>,
    pub errors: Option<Vec<GraphQLError>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GraphQLError {
    pub message: String,
}

impl<T> GraphQLResponse<T> {
    /// First error wins; a response without data is an error too.
    pub fn into_result(self) -> Result<T, String> {
        if let Some(error) = self.errors.and_then(|errors| errors.into_iter().next()) {
            return Err(error.message);
        }
        self.data.ok_or_else(|| "No data returned".to_string())
    }
}

async fn query<T: for<'de> Deserialize<'de>>(
    endpoint: &str,
    query_str: &str,
    variables: Option<serde_json::Value>,
) -> Result<T, String> {
    let req = GraphQLRequest {
        query: query_str.to_string(),
        variables,
    };

    let resp = reqwest::Client::new()
        .post(endpoint)
        .json(&req)
        .send()
        .await
        .map_err(|e| e.to_string())?;

    let gql_resp: GraphQLResponse<T> = resp.json().await.map_err(|e| e.to_string())?;
    gql_resp.into_result()
}

// Types mirroring the GraphQL schema

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapData {
    pub id: String,
    pub name: String,
    pub image_url: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PinData {
    pub id: String,
    pub x: f64,
    pub y: f64,
    pub title: String,
    pub notes: Option<String>,
    pub related_article_id: Option<String>,
    #[serde(default)]
    pub visibility: Visibility,
    pub date_key: Option<i64>,
    pub date_label: Option<String>,
}

impl From<PinData> for Pin {
    fn from(data: PinData) -> Self {
        let date = data.date_key.map(|key| PinDate {
            key: DateKey(key),
            label: data.date_label.unwrap_or_default(),
        });
        Pin {
            id: PinId::new(data.id),
            x: data.x,
            y: data.y,
            title: data.title,
            notes: data.notes,
            related_article_id: data.related_article_id,
            visibility: data.visibility,
            date,
        }
    }
}

// API functions

#[derive(Deserialize)]
pub struct MapsResponse {
    pub maps: Vec<MapData>,
}

pub async fn fetch_maps(endpoint: &str) -> Result<Vec<MapData>, String> {
    let resp: MapsResponse = query(endpoint, r#"query { maps { id name imageUrl } }"#, None).await?;
    Ok(resp.maps)
}

#[derive(Deserialize)]
pub struct FetchMapResponse {
    pub map: Option<MapData>,
}

pub async fn fetch_map(endpoint: &str, id: &str) -> Result<Option<MapData>, String> {
    let variables = serde_json::json!({ "id": id });
    let resp: FetchMapResponse = query(
        endpoint,
        r#"query FetchMap($id: ID!) { map(id: $id) { id name imageUrl } }"#,
        Some(variables),
    )
    .await?;
    Ok(resp.map)
}

#[derive(Deserialize)]
pub struct PinsResponse {
    pub pins: Vec<PinData>,
}

#[derive(Deserialize)]
pub struct CreatePinResponse {
    #[serde(rename = "createPin")]
    pub create_pin: PinData,
}

#[derive(Deserialize)]
pub struct UpdatePinResponse {
    #[serde(rename = "updatePin")]
    pub update_pin: PinData,
}

#[derive(Deserialize)]
pub struct DeletePinResponse {
    #[serde(rename = "deletePin")]
    pub delete_pin: bool,
}

/// The wiki backend as the map's pin store.
#[derive(Debug, Clone)]
pub struct GraphqlPinRepository {
    endpoint: String,
}

impl GraphqlPinRepository {
    pub fn new(endpoint: impl Into<String>) -> Self {
        GraphqlPinRepository {
            endpoint: endpoint.into(),
        }
    }
}

impl PinRepository for GraphqlPinRepository {
    async fn list_pins(&self, map: &MapId) -> Result<Vec<Pin>, String> {
        let variables = serde_json::json!({ "mapId": map });
        let resp: PinsResponse = query(
            &self.endpoint,
            &format!("query Pins($mapId: ID!) {{ pins(mapId: $mapId) {{ {PIN_FIELDS} }} }}"),
            Some(variables),
        )
        .await?;
        Ok(resp.pins.into_iter().map(Pin::from).collect())
    }

    async fn create_pin(&self, map: &MapId, pin: &NewPin) -> Result<Pin, String> {
        let resp: CreatePinResponse = query(
            &self.endpoint,
            &format!(
                "mutation CreatePin($input: CreatePinInput!) {{ createPin(input: $input) {{ {PIN_FIELDS} }} }}"
            ),
            Some(build_create_pin_variables(map, pin)),
        )
        .await?;
        Ok(resp.create_pin.into())
    }

    async fn update_pin(&self, id: &PinId, patch: &PinPatch) -> Result<Pin, String> {
        let resp: UpdatePinResponse = query(
            &self.endpoint,
            &format!(
                "mutation UpdatePin($id: ID!, $input: UpdatePinInput!) {{ updatePin(id: $id, input: $input) {{ {PIN_FIELDS} }} }}"
            ),
            Some(build_update_pin_variables(id, patch)),
        )
        .await?;
        Ok(resp.update_pin.into())
    }

    async fn delete_pin(&self, id: &PinId) -> Result<(), String> {
        let resp: DeletePinResponse = query(
            &self.endpoint,
            r#"mutation DeletePin($id: ID!) { deletePin(id: $id) }"#,
            Some(serde_json::json!({ "id": id })),
        )
        .await?;
        if resp.delete_pin {
            Ok(())
        } else {
            Err("Pin was not deleted".to_string())
        }
    }
}
