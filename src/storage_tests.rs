// ABOUTME: Tests for the storage layer
// ABOUTME: Covers login upserts, ownership filters, the ranked listing, and the admin cascade

#[cfg(test)]
mod tests {
    use super::super::storage::*;
    use super::super::types::*;
    use tempfile::TempDir;

    async fn create_test_storage() -> (Storage, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

        let storage = Storage::new(&db_url).await.unwrap();
        (storage, temp_dir)
    }

    fn profile(id: &str, username: &str) -> DiscordProfile {
        DiscordProfile {
            id: id.to_string(),
            username: username.to_string(),
            avatar: Some("avatar_hash".to_string()),
            email: Some(format!("{username}@example.com")),
        }
    }

    fn save_req(title: &str) -> SavePortfolioRequest {
        SavePortfolioRequest {
            portfolio_id: None,
            title: Some(title.to_string()),
            template: None,
            background_color: None,
            elements: Some(serde_json::json!([
                {"type": "text", "x": 10, "y": 20, "content": "hello"}
            ])),
        }
    }

    async fn set_created_at(storage: &Storage, portfolio_id: &str, created_at: i64) {
        sqlx::query("UPDATE portfolios SET created_at = ? WHERE id = ?")
            .bind(created_at)
            .bind(portfolio_id)
            .execute(&storage.pool)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn first_login_creates_user_with_defaults() {
        let (storage, _temp_dir) = create_test_storage().await;

        let user = storage.upsert_login(&profile("42", "alice")).await.unwrap();

        assert_eq!(user.discord_id, "42");
        assert_eq!(user.username, "alice");
        assert_eq!(user.profile_visibility, Visibility::Public);
        assert_eq!(user.description, "");
        assert!(user.restrictions.is_none());
    }

    #[tokio::test]
    async fn second_login_refreshes_provider_fields_only() {
        let (storage, _temp_dir) = create_test_storage().await;

        let first = storage.upsert_login(&profile("42", "alice")).await.unwrap();
        let second = storage
            .upsert_login(&profile("42", "alice_renamed"))
            .await
            .unwrap();

        assert_eq!(second.id, first.id);
        assert_eq!(second.username, "alice_renamed");
        assert_eq!(second.created_at, first.created_at);
        assert!(second.last_login >= first.last_login);
    }

    #[tokio::test]
    async fn update_portfolio_requires_matching_owner() {
        let (storage, _temp_dir) = create_test_storage().await;

        let id = storage
            .create_portfolio("42", "alice", &save_req("Mine"))
            .await
            .unwrap();

        let mut req = save_req("Hijacked");
        req.portfolio_id = Some(id.clone());

        assert!(!storage.update_portfolio(&id, "99", "mallory", &req).await.unwrap());
        assert!(storage.update_portfolio(&id, "42", "alice", &req).await.unwrap());

        let stored = storage.get_portfolio(&id).await.unwrap().unwrap();
        assert_eq!(stored.title, "Hijacked");
        assert_eq!(stored.user_id, "42");
    }

    #[tokio::test]
    async fn fetch_for_owner_hides_other_users_portfolios() {
        let (storage, _temp_dir) = create_test_storage().await;

        let id = storage
            .create_portfolio("42", "alice", &save_req("Mine"))
            .await
            .unwrap();

        assert!(storage.get_portfolio_for_owner(&id, "42").await.unwrap().is_some());
        assert!(storage.get_portfolio_for_owner(&id, "99").await.unwrap().is_none());
        // Public fetch has no owner filter
        assert!(storage.get_portfolio(&id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn owner_delete_checks_ownership_and_leaves_reviews() {
        let (storage, _temp_dir) = create_test_storage().await;

        let id = storage
            .create_portfolio("42", "alice", &save_req("Mine"))
            .await
            .unwrap();
        storage.insert_review(&id, "7", "bob", 5, "nice").await.unwrap();

        assert!(!storage.delete_portfolio(&id, "99").await.unwrap());
        assert!(storage.delete_portfolio(&id, "42").await.unwrap());

        // No cascade on owner delete; the review is orphaned
        assert_eq!(storage.list_reviews(&id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn cascade_delete_reports_removed_review_count() {
        let (storage, _temp_dir) = create_test_storage().await;

        let id = storage
            .create_portfolio("42", "alice", &save_req("Mine"))
            .await
            .unwrap();
        storage.insert_review(&id, "7", "bob", 5, "").await.unwrap();
        storage.insert_review(&id, "8", "carol", 3, "").await.unwrap();
        storage.insert_review(&id, "9", "dave", 4, "").await.unwrap();

        let removed = storage.delete_portfolio_cascade(&id).await.unwrap();
        assert_eq!(removed, Some(3));

        assert!(storage.get_portfolio(&id).await.unwrap().is_none());
        assert!(storage.list_reviews(&id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn cascade_delete_of_unknown_portfolio_is_none() {
        let (storage, _temp_dir) = create_test_storage().await;

        assert_eq!(storage.delete_portfolio_cascade("nope").await.unwrap(), None);
    }

    #[tokio::test]
    async fn ranked_listing_averages_and_counts() {
        let (storage, _temp_dir) = create_test_storage().await;

        let id = storage
            .create_portfolio("42", "alice", &save_req("Rated"))
            .await
            .unwrap();
        storage.insert_review(&id, "7", "bob", 5, "").await.unwrap();
        storage.insert_review(&id, "8", "carol", 3, "").await.unwrap();
        storage.insert_review(&id, "9", "dave", 4, "").await.unwrap();

        let ranked = storage.list_ranked().await.unwrap();
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].avg_rating, 4.0);
        assert_eq!(ranked[0].review_count, 3);
    }

    #[tokio::test]
    async fn ranked_listing_sorts_by_rating_then_recency() {
        let (storage, _temp_dir) = create_test_storage().await;

        // Unreviewed but newest
        let p_zero = storage
            .create_portfolio("1", "ann", &save_req("Unreviewed"))
            .await
            .unwrap();
        set_created_at(&storage, &p_zero, 300).await;

        // Same average, different creation times
        let p_old = storage
            .create_portfolio("2", "ben", &save_req("Old"))
            .await
            .unwrap();
        set_created_at(&storage, &p_old, 100).await;
        storage.insert_review(&p_old, "7", "bob", 4, "").await.unwrap();

        let p_new = storage
            .create_portfolio("3", "cat", &save_req("New"))
            .await
            .unwrap();
        set_created_at(&storage, &p_new, 200).await;
        storage.insert_review(&p_new, "7", "bob", 4, "").await.unwrap();

        let ranked = storage.list_ranked().await.unwrap();
        let ids: Vec<&str> = ranked.iter().map(|p| p.portfolio.id.as_str()).collect();

        // Tied averages break newest-first; zero reviews sort last
        assert_eq!(ids, vec![p_new.as_str(), p_old.as_str(), p_zero.as_str()]);
        assert_eq!(ranked[2].avg_rating, 0.0);
        assert_eq!(ranked[2].review_count, 0);
    }

    #[tokio::test]
    async fn one_review_per_reviewer_is_detectable() {
        let (storage, _temp_dir) = create_test_storage().await;

        let id = storage
            .create_portfolio("42", "alice", &save_req("Mine"))
            .await
            .unwrap();

        assert!(storage.find_review(&id, "7").await.unwrap().is_none());
        storage.insert_review(&id, "7", "bob", 5, "great").await.unwrap();
        assert!(storage.find_review(&id, "7").await.unwrap().is_some());
        // A different reviewer is unaffected
        assert!(storage.find_review(&id, "8").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn reviews_list_newest_first() {
        let (storage, _temp_dir) = create_test_storage().await;

        let id = storage
            .create_portfolio("42", "alice", &save_req("Mine"))
            .await
            .unwrap();
        storage.insert_review(&id, "7", "bob", 5, "first").await.unwrap();
        storage.insert_review(&id, "8", "carol", 3, "second").await.unwrap();
        sqlx::query("UPDATE reviews SET created_at = 100 WHERE user_id = '7'")
            .execute(&storage.pool)
            .await
            .unwrap();
        sqlx::query("UPDATE reviews SET created_at = 200 WHERE user_id = '8'")
            .execute(&storage.pool)
            .await
            .unwrap();

        let reviews = storage.list_reviews(&id).await.unwrap();
        assert_eq!(reviews.len(), 2);
        assert_eq!(reviews[0].comment, "second");
        assert_eq!(reviews[1].comment, "first");
    }

    #[tokio::test]
    async fn restrictions_are_replaced_whole_and_cleared() {
        let (storage, _temp_dir) = create_test_storage().await;

        let user = storage.upsert_login(&profile("42", "alice")).await.unwrap();

        let first = Restrictions {
            reason: "spam".to_string(),
            block_reviews: true,
            block_portfolios: true,
            applied_at: 100,
            applied_by: "admin".to_string(),
            ..Default::default()
        };
        assert!(storage.set_restrictions(&user.id, &first).await.unwrap());

        // Full replace, not a merge: the second overlay drops block_portfolios
        let second = Restrictions {
            reason: "cooled down".to_string(),
            block_reviews: true,
            applied_at: 200,
            applied_by: "admin".to_string(),
            ..Default::default()
        };
        assert!(storage.set_restrictions(&user.id, &second).await.unwrap());

        let stored = storage
            .find_user_by_discord_id("42")
            .await
            .unwrap()
            .unwrap()
            .restrictions
            .unwrap();
        assert_eq!(stored.reason, "cooled down");
        assert!(stored.block_reviews);
        assert!(!stored.block_portfolios);

        assert!(storage.clear_restrictions(&user.id).await.unwrap());
        let cleared = storage.find_user_by_discord_id("42").await.unwrap().unwrap();
        assert!(cleared.restrictions.is_none());
    }

    #[tokio::test]
    async fn restricting_unknown_user_matches_nothing() {
        let (storage, _temp_dir) = create_test_storage().await;

        let restrictions = Restrictions::default();
        assert!(!storage.set_restrictions("missing", &restrictions).await.unwrap());
        assert!(!storage.clear_restrictions("missing").await.unwrap());
    }

    #[tokio::test]
    async fn search_matches_username_or_discord_id_case_insensitively() {
        let (storage, _temp_dir) = create_test_storage().await;

        storage.upsert_login(&profile("1001", "Alpha")).await.unwrap();
        storage.upsert_login(&profile("1002", "beta")).await.unwrap();
        storage.upsert_login(&profile("2001", "alphabet")).await.unwrap();

        let by_name = storage.search_users("ALPHA").await.unwrap();
        assert_eq!(by_name.len(), 2);

        let by_id = storage.search_users("100").await.unwrap();
        assert_eq!(by_id.len(), 2);
    }

    #[tokio::test]
    async fn search_wildcard_characters_match_literally() {
        let (storage, _temp_dir) = create_test_storage().await;

        storage.upsert_login(&profile("1001", "percent%sign")).await.unwrap();
        storage.upsert_login(&profile("1002", "under_score")).await.unwrap();
        storage.upsert_login(&profile("1003", "plain")).await.unwrap();

        // `%` is not a match-everything wildcard
        let by_percent = storage.search_users("%").await.unwrap();
        assert_eq!(by_percent.len(), 1);
        assert_eq!(by_percent[0].username, "percent%sign");

        // `_` is not a match-any-character wildcard
        let by_underscore = storage.search_users("_").await.unwrap();
        assert_eq!(by_underscore.len(), 1);
        assert_eq!(by_underscore[0].username, "under_score");
    }

    #[tokio::test]
    async fn search_results_are_capped_at_twenty() {
        let (storage, _temp_dir) = create_test_storage().await;

        for i in 0..25 {
            storage
                .upsert_login(&profile(&format!("5{i:03}"), &format!("member{i}")))
                .await
                .unwrap();
        }

        let results = storage.search_users("member").await.unwrap();
        assert_eq!(results.len(), 20);
    }

    #[tokio::test]
    async fn profile_updates_are_partial() {
        let (storage, _temp_dir) = create_test_storage().await;

        storage.upsert_login(&profile("42", "alice")).await.unwrap();

        storage
            .update_profile("42", Some("my bio"), None)
            .await
            .unwrap();
        let user = storage.find_user_by_discord_id("42").await.unwrap().unwrap();
        assert_eq!(user.description, "my bio");
        assert_eq!(user.profile_visibility, Visibility::Public);

        storage
            .update_profile("42", None, Some(Visibility::Private))
            .await
            .unwrap();
        let user = storage.find_user_by_discord_id("42").await.unwrap().unwrap();
        assert_eq!(user.description, "my bio");
        assert_eq!(user.profile_visibility, Visibility::Private);
    }

    #[tokio::test]
    async fn counts_cover_all_three_collections() {
        let (storage, _temp_dir) = create_test_storage().await;

        storage.upsert_login(&profile("42", "alice")).await.unwrap();
        let id = storage
            .create_portfolio("42", "alice", &save_req("Mine"))
            .await
            .unwrap();
        storage.insert_review(&id, "7", "bob", 5, "").await.unwrap();

        let stats = storage.counts().await.unwrap();
        assert_eq!(stats.users, 1);
        assert_eq!(stats.portfolios, 1);
        assert_eq!(stats.reviews, 1);
    }
}
