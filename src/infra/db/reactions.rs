use std::collections::HashMap;

use async_trait::async_trait;

use crate::application::repos::{ReactionsRepo, RepoError};
use crate::domain::entities::Reaction;

use super::{PostgresRepositories, map_sqlx_error};

const VIEWER_REACTIONS_SQL: &str = "SELECT comment_id::text AS comment_id, kind \
    FROM comment_reactions \
    WHERE user_id::text = $1 AND comment_id::text = ANY($2)";

#[derive(sqlx::FromRow)]
struct ReactionRow {
    comment_id: String,
    kind: String,
}

fn fold_reactions(rows: Vec<ReactionRow>) -> HashMap<String, Reaction> {
    let mut reactions: HashMap<String, Reaction> = HashMap::new();
    for row in rows {
        let entry = reactions.entry(row.comment_id).or_default();
        match row.kind.as_str() {
            "like" => entry.liked = true,
            "dislike" => entry.disliked = true,
            _ => {}
        }
    }
    reactions
}

#[async_trait]
impl ReactionsRepo for PostgresRepositories {
    async fn viewer_reactions(
        &self,
        viewer_id: &str,
        record_ids: &[String],
    ) -> Result<HashMap<String, Reaction>, RepoError> {
        if record_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = sqlx::query_as::<_, ReactionRow>(VIEWER_REACTIONS_SQL)
            .bind(viewer_id)
            .bind(record_ids)
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(fold_reactions(rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_fold_into_one_reaction_per_comment() {
        let rows = vec![
            ReactionRow {
                comment_id: "1".into(),
                kind: "like".into(),
            },
            ReactionRow {
                comment_id: "2".into(),
                kind: "dislike".into(),
            },
            ReactionRow {
                comment_id: "2".into(),
                kind: "like".into(),
            },
            ReactionRow {
                comment_id: "3".into(),
                kind: "laugh".into(),
            },
        ];

        let reactions = fold_reactions(rows);

        assert_eq!(
            reactions["1"],
            Reaction {
                liked: true,
                disliked: false
            }
        );
        assert_eq!(
            reactions["2"],
            Reaction {
                liked: true,
                disliked: true
            }
        );
        assert_eq!(reactions["3"], Reaction::default());
    }
}
