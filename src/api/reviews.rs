use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;

use crate::cache::{EntityKind, Tag};
use crate::mutation::{item_tags, MutationEndpoint};
use crate::query::{Provides, QueryEndpoint};
use crate::transport::Request;

use super::types::{ListParams, ListResponse, MutationResponse, NamedRef};

const KIND: EntityKind = EntityKind::Review;

/// Query-string filter selecting approved or pending reviews.
pub const APPROVAL_FILTER: &str = "isApproved";

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reviewer {
  #[serde(default)]
  pub id: String,
  #[serde(default)]
  pub first_name: String,
  #[serde(default)]
  pub last_name: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
  pub id: String,
  #[serde(default)]
  pub user_id: String,
  pub product_id: String,
  #[serde(default)]
  pub rating: u8,
  #[serde(default)]
  pub comment: String,
  #[serde(default)]
  pub images: Vec<String>,
  #[serde(default)]
  pub is_approved: bool,
  #[serde(default)]
  pub created_at: Option<DateTime<Utc>>,
  #[serde(default)]
  pub user: Option<Reviewer>,
  #[serde(default)]
  pub product: Option<NamedRef>,
}

impl Review {
  pub fn reviewer_name(&self) -> String {
    match &self.user {
      Some(user) => format!("{} {}", user.first_name, user.last_name)
        .trim()
        .to_string(),
      None => "Unknown".to_string(),
    }
  }

  pub fn product_name(&self) -> &str {
    self.product.as_ref().map(|p| p.name.as_str()).unwrap_or("-")
  }

  /// Rating as filled and empty stars.
  pub fn stars(&self) -> String {
    let filled = usize::from(self.rating.min(5));
    format!("{}{}", "★".repeat(filled), "☆".repeat(5 - filled))
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApproveInput {
  pub review_id: String,
  pub approve: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteReviewInput {
  pub review_id: String,
  pub product_id: String,
}

fn list_request(params: &ListParams) -> Request {
  Request::get("/admin/reviews").with_params(params.to_query())
}

fn approve_request(input: &ApproveInput) -> Request {
  Request::patch(
    format!("/admin/reviews/{}/approve", input.review_id),
    json!({ "approve": input.approve }),
  )
}

fn delete_request(input: &DeleteReviewInput) -> Request {
  Request::delete(format!(
    "/products/{}/reviews/{}",
    input.product_id, input.review_id
  ))
}

fn approved(input: &ApproveInput, _: &MutationResponse) -> BTreeSet<Tag> {
  item_tags(KIND, input.review_id.as_str())
}

/// The product's rating and review count change with its reviews.
fn deleted(input: &DeleteReviewInput, _: &MutationResponse) -> BTreeSet<Tag> {
  let mut tags = item_tags(KIND, input.review_id.as_str());
  tags.insert(Tag::item(EntityKind::Product, input.product_id.as_str()));
  tags
}

/// Server-paginated, filtered by `isApproved`.
pub const LIST: QueryEndpoint<ListParams, ListResponse<Review>> =
  QueryEndpoint::new("reviews", KIND, list_request, Provides::ListItems);

pub const APPROVE: MutationEndpoint<ApproveInput, MutationResponse> =
  MutationEndpoint::new("approve_review", KIND, approve_request, approved);

pub const DELETE: MutationEndpoint<DeleteReviewInput, MutationResponse> =
  MutationEndpoint::new("delete_review", KIND, delete_request, deleted);
