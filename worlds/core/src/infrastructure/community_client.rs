// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Community Membership Client
//!
//! HTTP adapter for the community-membership service. Memberships sit on a
//! trust boundary: a service outage must read as "member of nothing", so
//! every failure path here logs and returns empty instead of erroring.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::application::access_checker::CommunityMembershipService;

#[derive(Debug, Serialize)]
struct MembershipQuery<'a> {
    community_ids: &'a [String],
}

#[derive(Debug, Deserialize)]
struct MembershipResponse {
    #[serde(default)]
    communities: Vec<CommunityRef>,
}

#[derive(Debug, Deserialize)]
struct CommunityRef {
    id: String,
}

pub struct HttpCommunityService {
    base_url: String,
    client: Client,
}

impl HttpCommunityService {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: Client::new(),
        }
    }

    async fn query(&self, identity: &str, community_ids: &[String]) -> reqwest::Result<Vec<String>> {
        let url = format!("{}/v1/members/{}/communities", self.base_url, identity);
        let response = self
            .client
            .post(&url)
            .json(&MembershipQuery { community_ids })
            .send()
            .await?
            .error_for_status()?
            .json::<MembershipResponse>()
            .await?;
        Ok(response.communities.into_iter().map(|c| c.id).collect())
    }
}

#[async_trait]
impl CommunityMembershipService for HttpCommunityService {
    /// One batched request per check. Fails closed: any transport or HTTP
    /// failure is an empty membership list.
    async fn get_member_communities(&self, identity: &str, community_ids: &[String]) -> Vec<String> {
        if community_ids.is_empty() {
            return Vec::new();
        }
        match self.query(identity, community_ids).await {
            Ok(ids) => ids,
            Err(e) => {
                warn!(
                    identity = %identity,
                    queried = community_ids.len(),
                    error = %e,
                    "Community membership lookup failed, treating as non-member"
                );
                Vec::new()
            }
        }
    }
}
