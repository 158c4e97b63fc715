//! Non-interactive record commands, run through the same endpoints as the TUI.

use clap::ValueEnum;
use color_eyre::{
  eyre::{bail, eyre},
  Result,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::info;

use crate::api::types::{format_date, money};
use crate::api::{categories, plans, products, UpdateInput};
use crate::client::ApiClient;
use crate::query::Query;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Resource {
  Categories,
  Products,
  Plans,
}

fn parse_body(json: &str) -> Result<Value> {
  let body: Value = serde_json::from_str(json).map_err(|e| eyre!("Invalid JSON body: {}", e))?;
  if !body.is_object() {
    bail!("JSON body must be an object");
  }
  Ok(body)
}

fn typed<T: DeserializeOwned>(body: Value) -> Result<T> {
  serde_json::from_value(body).map_err(|e| eyre!("Body does not match the record: {}", e))
}

/// Wait for a mounted query and take its data or its error.
async fn fetch<P, T>(mut query: Query<P, T>) -> Result<T>
where
  P: serde::Serialize + Clone,
  T: DeserializeOwned + Clone,
{
  query.settled().await;
  if let Some(error) = query.error() {
    return Err(error.clone().into());
  }
  query
    .fresh_data()
    .cloned()
    .ok_or_else(|| eyre!("No data returned"))
}

/// One record as a few summary lines.
pub async fn show(client: &ApiClient, resource: Resource, key: String, by_slug: bool) -> Result<String> {
  match resource {
    Resource::Products => {
      let endpoint = if by_slug { products::BY_SLUG } else { products::GET };
      let product = fetch(endpoint.query(client, key)).await?.data;
      Ok(format!(
        "{} ({})\n  sku {}  price {}  stock {}  status {}\n  category {}  created {}",
        product.name,
        product.id,
        product.sku,
        money(product.effective_price()),
        product.stock,
        product.status,
        product.category_name(),
        format_date(product.created_at.as_ref()),
      ))
    }
    Resource::Plans if !by_slug => {
      let plan = fetch(plans::GET.query(client, key)).await?.data;
      Ok(format!(
        "{} ({})\n  {} / {}  status {}\n  limits {}",
        plan.name,
        plan.id,
        money(plan.price),
        plan.billing_cycle,
        plan.status,
        plan.limits_summary(),
      ))
    }
    Resource::Plans => bail!("plans cannot be looked up by slug"),
    Resource::Categories => bail!("categories have no single-record endpoint, use the table view"),
  }
}

pub async fn create(client: &ApiClient, resource: Resource, json: &str) -> Result<String> {
  let body = parse_body(json)?;
  let response = match resource {
    Resource::Categories => categories::CREATE.mutate(client, &typed(body)?).await?,
    Resource::Products => products::CREATE.mutate(client, &typed(body)?).await?,
    Resource::Plans => plans::CREATE.mutate(client, &body).await?,
  };
  info!(?resource, "record created from command line");
  Ok(response.message_or("Created"))
}

pub async fn update(client: &ApiClient, resource: Resource, id: String, json: &str) -> Result<String> {
  let body = parse_body(json)?;
  let response = match resource {
    Resource::Categories => {
      let input = UpdateInput { id, data: typed(body)? };
      categories::UPDATE.mutate(client, &input).await?
    }
    Resource::Products => {
      let input = UpdateInput { id, data: typed(body)? };
      products::UPDATE.mutate(client, &input).await?
    }
    Resource::Plans => plans::UPDATE.mutate(client, &UpdateInput { id, data: body }).await?,
  };
  info!(?resource, "record updated from command line");
  Ok(response.message_or("Updated"))
}
