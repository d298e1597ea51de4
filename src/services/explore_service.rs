use crate::{
    database::{MongoDB, STUDY_SETS},
    models::{Difficulty, StudySet, StudySetSummary},
    utils::{
        query::{contains_ci, Page},
        AppError,
    },
};
use futures::TryStreamExt;
use mongodb::bson::{doc, Document};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ExploreSort {
    #[default]
    Recent,
    Popular,
}

impl ExploreSort {
    fn order(&self) -> Document {
        match self {
            ExploreSort::Recent => doc! { "created_at": -1 },
            ExploreSort::Popular => doc! { "favorite_count": -1, "created_at": -1 },
        }
    }
}

#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ExploreQuery {
    /// Matches names and categories
    pub q: Option<String>,
    pub category: Option<String>,
    pub difficulty: Option<Difficulty>,
    pub sort: Option<ExploreSort>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ExplorePage {
    pub study_sets: Vec<StudySetSummary>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub has_more: bool,
}

/// Public sets only, narrowed by the optional text, category and difficulty.
pub fn explore_filter(query: &ExploreQuery) -> Document {
    let mut filter = doc! { "is_public": true };

    if let Some(category) = query.category.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
        filter.insert("categories", category.to_lowercase());
    }
    if let Some(difficulty) = query.difficulty {
        filter.insert("difficulty", difficulty.as_str());
    }
    if let Some(q) = query.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
        filter.insert("$or", vec![contains_ci("name", q), contains_ci("categories", q)]);
    }
    filter
}

pub async fn explore(db: &MongoDB, query: &ExploreQuery) -> Result<ExplorePage, AppError> {
    let page = Page::new(query.page, query.limit);
    let filter = explore_filter(query);
    let sets = db.collection::<StudySet>(STUDY_SETS);

    let total = sets.count_documents(filter.clone()).await?;
    let found: Vec<StudySet> = sets
        .find(filter)
        .sort(query.sort.unwrap_or_default().order())
        .skip(page.skip())
        .limit(i64::from(page.limit))
        .await?
        .try_collect()
        .await?;

    Ok(ExplorePage {
        study_sets: found.iter().map(StudySetSummary::from).collect(),
        total,
        page: page.page,
        limit: page.limit,
        has_more: page.has_more(total),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_is_public_only() {
        assert_eq!(explore_filter(&ExploreQuery::default()), doc! { "is_public": true });
    }

    #[test]
    fn test_filter_combines_criteria() {
        let query = ExploreQuery {
            q: Some(" (cells) ".into()),
            category: Some(" Biology".into()),
            difficulty: Some(Difficulty::Medium),
            ..Default::default()
        };
        let filter = explore_filter(&query);

        assert!(filter.get_bool("is_public").unwrap());
        assert_eq!(filter.get_str("categories").unwrap(), "biology");
        assert_eq!(filter.get_str("difficulty").unwrap(), "medium");

        let or = filter.get_array("$or").unwrap();
        let name = or[0].as_document().unwrap().get_document("name").unwrap();
        assert_eq!(name.get_str("$regex").unwrap(), r"\(cells\)");
    }

    #[test]
    fn test_blank_criteria_are_ignored() {
        let query = ExploreQuery {
            q: Some("   ".into()),
            category: Some("".into()),
            ..Default::default()
        };
        assert_eq!(explore_filter(&query), doc! { "is_public": true });
    }

    #[test]
    fn test_sort_orders() {
        assert_eq!(ExploreSort::default(), ExploreSort::Recent);
        assert_eq!(ExploreSort::Popular.order().keys().next().map(String::as_str), Some("favorite_count"));
        let sort: ExploreSort = serde_json::from_str("\"popular\"").unwrap();
        assert_eq!(sort, ExploreSort::Popular);
    }
}
