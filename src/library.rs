use crate::errors::AppResult;
use crate::filter::{self, FilterParams};
use crate::models::{
    AdRecord, CreateGroupPayload, GroupBucket, GroupId, GroupInfo, MoveAdPayload, UngroupedBucket,
    ViewResponse,
};
use crate::partition::{ads_count_total, partition};
use crate::sheets::SheetsProvider;
use crate::state::{DashboardState, DropTarget};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Owns the dashboard state and the spreadsheet collaborator. Every operation
/// behind the HTTP surface goes through here; mutations run synchronously
/// under the state lock.
pub struct LibraryCore {
    state: Mutex<DashboardState>,
    sheets: Arc<dyn SheetsProvider>,
}

impl LibraryCore {
    pub fn new(sheets: Arc<dyn SheetsProvider>) -> Self {
        Self {
            state: Mutex::new(DashboardState::default()),
            sheets,
        }
    }

    /// Seeds the record store from the sheet. A failed fetch leaves the store
    /// empty; the dashboard still renders and the operator sees the warning.
    pub async fn load(&self) {
        match self.sheets.fetch_records().await {
            Ok(records) => {
                let mut state = self.state.lock().await;
                *state = DashboardState::seed(records);
                tracing::info!(
                    records = state.records().len(),
                    groups = state.groups().len(),
                    "record store seeded"
                );
            }
            Err(error) => {
                tracing::warn!(error = %error, "initial sheet fetch failed; starting empty");
            }
        }
    }

    /// Page over the full record store, `pages/api/ads` semantics: slicing
    /// past the end yields an empty page, never an error.
    pub async fn list_ads(&self, offset: usize, limit: usize) -> Vec<AdRecord> {
        let state = self.state.lock().await;
        state
            .records()
            .iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect()
    }

    /// The filtered + partitioned view for one filter selection, including
    /// empty groups owned by the selected brand.
    pub async fn view(&self, params: FilterParams) -> ViewResponse {
        let state = self.state.lock().await;
        let filtered = filter::apply(state.records(), &params);
        let filtered_count = filtered.len();
        let total_ads_in_range = ads_count_total(filtered.iter().copied());
        let split = partition(filtered);

        let visible_groups: Vec<GroupId> = match &params.brand {
            Some(brand) => filter::groups_for_brand(state.groups(), brand)
                .into_iter()
                .cloned()
                .collect(),
            None => state.groups().to_vec(),
        };

        let groups = visible_groups
            .iter()
            .map(|group| {
                let ads = split
                    .grouped
                    .iter()
                    .find(|(id, _)| id == group)
                    .map(|(_, members)| members.clone())
                    .unwrap_or_default();
                GroupBucket {
                    group: GroupInfo::from(group),
                    total_ads: ads_count_total(&ads),
                    ads,
                }
            })
            .collect();

        ViewResponse {
            brands: filter::brand_list(state.records()),
            dirty: state.dirty(),
            filtered_count,
            total_ads_in_range,
            ungrouped: UngroupedBucket {
                total_ads: ads_count_total(&split.ungrouped),
                ads: split.ungrouped,
            },
            groups,
        }
    }

    /// Creates a group and moves the caller's selection into it in one step.
    pub async fn create_group(&self, payload: CreateGroupPayload) -> AppResult<GroupInfo> {
        let mut state = self.state.lock().await;
        let group = state.create_group(&payload.brand, &payload.name)?;
        if !payload.library_ids.is_empty() {
            state.assign_records(&group, &payload.library_ids)?;
        }
        tracing::info!(group = %group, moved = payload.library_ids.len(), "group created");
        Ok(GroupInfo::from(&group))
    }

    pub async fn rename_group(&self, display: &str, new_name: &str) -> AppResult<GroupInfo> {
        let mut state = self.state.lock().await;
        let old = state.find_group(display)?;
        let renamed = state.rename_group(&old, new_name)?;
        tracing::info!(from = %old, to = %renamed, "group renamed");
        Ok(GroupInfo::from(&renamed))
    }

    /// The confirmation dialog is the client's concern; by the time this is
    /// called the deletion is decided.
    pub async fn delete_group(&self, display: &str) -> AppResult<()> {
        let mut state = self.state.lock().await;
        let group = state.find_group(display)?;
        state.delete_group(&group)?;
        tracing::info!(group = %group, "group deleted");
        Ok(())
    }

    pub async fn move_ad(&self, payload: MoveAdPayload) -> AppResult<()> {
        let dest = DropTarget::parse(&payload.dest)?;
        let mut state = self.state.lock().await;
        state.move_record(&payload.library_id, &dest)
    }

    /// Persists every record's group cell. The assignments and the revision
    /// are snapshotted under the lock, the network write runs without it, and
    /// the dirty flag clears only if nothing mutated in between.
    pub async fn save(&self) -> AppResult<()> {
        let (assignments, snapshot) = {
            let state = self.state.lock().await;
            (state.assignments(), state.revision())
        };

        self.sheets.write_groups(&assignments).await?;

        let mut state = self.state.lock().await;
        state.mark_saved(snapshot);
        Ok(())
    }

    pub async fn dirty(&self) -> bool {
        self.state.lock().await.dirty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{AppError, AppResult};
    use crate::models::{GroupAssignment, UNGROUPED_ZONE};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex as StdMutex;

    struct MockSheets {
        records: Vec<AdRecord>,
        fail_writes: AtomicBool,
        written: StdMutex<Vec<Vec<GroupAssignment>>>,
    }

    impl MockSheets {
        fn with_records(records: Vec<AdRecord>) -> Self {
            Self {
                records,
                fail_writes: AtomicBool::new(false),
                written: StdMutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl SheetsProvider for MockSheets {
        async fn fetch_records(&self) -> AppResult<Vec<AdRecord>> {
            Ok(self.records.clone())
        }

        async fn write_groups(&self, assignments: &[GroupAssignment]) -> AppResult<()> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(AppError::Sheets("simulated outage".to_string()));
            }
            self.written
                .lock()
                .expect("written lock")
                .push(assignments.to_vec());
            Ok(())
        }
    }

    fn ad(brand: &str, library_id: &str, count: &str) -> AdRecord {
        AdRecord {
            brand: brand.to_string(),
            library_id: library_id.to_string(),
            start_date: "2025-06-01".to_string(),
            ads_count: count.to_string(),
            s3_key: String::new(),
            ad_link: String::new(),
            updated_date: String::new(),
            active_status: true,
            group: None,
        }
    }

    async fn seeded_core(records: Vec<AdRecord>) -> (LibraryCore, Arc<MockSheets>) {
        let sheets = Arc::new(MockSheets::with_records(records));
        let core = LibraryCore::new(sheets.clone());
        core.load().await;
        (core, sheets)
    }

    #[tokio::test]
    async fn view_includes_empty_groups_for_the_brand() {
        let (core, _) = seeded_core(vec![ad("A", "L1", "2"), ad("B", "L2", "3")]).await;
        core.create_group(CreateGroupPayload {
            brand: "A".to_string(),
            name: "Empty".to_string(),
            library_ids: vec![],
        })
        .await
        .expect("create");

        let view = core
            .view(FilterParams {
                brand: Some("A".to_string()),
                ..FilterParams::default()
            })
            .await;
        assert_eq!(view.brands, vec!["A", "B"]);
        assert_eq!(view.groups.len(), 1);
        assert_eq!(view.groups[0].group.name, "Empty");
        assert!(view.groups[0].ads.is_empty());
        assert_eq!(view.ungrouped.ads.len(), 1);
        assert_eq!(view.total_ads_in_range, 2);
    }

    #[tokio::test]
    async fn brand_with_no_matches_shows_nothing() {
        let (core, _) = seeded_core(vec![ad("A", "L1", "2")]).await;
        let view = core
            .view(FilterParams {
                brand: Some("Z".to_string()),
                ..FilterParams::default()
            })
            .await;
        assert!(view.ungrouped.ads.is_empty());
        assert!(view.groups.is_empty());
        assert_eq!(view.filtered_count, 0);
    }

    #[tokio::test]
    async fn create_with_selection_moves_records() {
        let (core, _) = seeded_core(vec![ad("A", "L1", "1"), ad("A", "L2", "1")]).await;
        let info = core
            .create_group(CreateGroupPayload {
                brand: "A".to_string(),
                name: "Sale".to_string(),
                library_ids: vec!["L1".to_string()],
            })
            .await
            .expect("create");

        let view = core.view(FilterParams::default()).await;
        assert_eq!(view.ungrouped.ads.len(), 1);
        assert_eq!(view.ungrouped.ads[0].library_id, "L2");
        assert_eq!(view.groups.len(), 1);
        assert_eq!(view.groups[0].group.id, info.id);
        assert_eq!(view.groups[0].ads[0].library_id, "L1");
    }

    #[tokio::test]
    async fn rename_keeps_members_and_updates_display_name() {
        let (core, _) = seeded_core(vec![ad("A", "L1", "1")]).await;
        let info = core
            .create_group(CreateGroupPayload {
                brand: "A".to_string(),
                name: "Old".to_string(),
                library_ids: vec!["L1".to_string()],
            })
            .await
            .expect("create");

        let renamed = core.rename_group(&info.id, "New").await.expect("rename");
        assert_eq!(renamed.name, "New");

        let view = core.view(FilterParams::default()).await;
        assert_eq!(view.groups.len(), 1);
        assert_eq!(view.groups[0].group.id, renamed.id);
        assert_eq!(view.groups[0].ads.len(), 1);
    }

    #[tokio::test]
    async fn save_round_trips_assignments_and_clears_dirty() {
        let (core, sheets) = seeded_core(vec![ad("A", "L1", "1"), ad("A", "L2", "1")]).await;
        let info = core
            .create_group(CreateGroupPayload {
                brand: "A".to_string(),
                name: "Sale".to_string(),
                library_ids: vec![],
            })
            .await
            .expect("create");
        core.move_ad(MoveAdPayload {
            library_id: "L1".to_string(),
            dest: info.id.clone(),
        })
        .await
        .expect("move");
        assert!(core.dirty().await);

        core.save().await.expect("save");
        assert!(!core.dirty().await);

        let written = sheets.written.lock().expect("written lock");
        assert_eq!(written.len(), 1);
        assert_eq!(written[0][0].library_id, "L1");
        assert_eq!(written[0][0].group, info.id);
        assert_eq!(written[0][1].group, "");
    }

    #[tokio::test]
    async fn failed_save_keeps_dirty_flag() {
        let (core, sheets) = seeded_core(vec![ad("A", "L1", "1")]).await;
        core.create_group(CreateGroupPayload {
            brand: "A".to_string(),
            name: "Sale".to_string(),
            library_ids: vec![],
        })
        .await
        .expect("create");
        sheets.fail_writes.store(true, Ordering::SeqCst);

        let result = core.save().await;
        assert!(matches!(result, Err(AppError::Sheets(_))));
        assert!(core.dirty().await);
    }

    #[tokio::test]
    async fn move_round_trip_and_sentinel_zone() {
        let (core, _) = seeded_core(vec![ad("A", "L1", "1")]).await;
        let info = core
            .create_group(CreateGroupPayload {
                brand: "A".to_string(),
                name: "Sale".to_string(),
                library_ids: vec![],
            })
            .await
            .expect("create");

        core.move_ad(MoveAdPayload {
            library_id: "L1".to_string(),
            dest: info.id.clone(),
        })
        .await
        .expect("move in");
        core.move_ad(MoveAdPayload {
            library_id: "L1".to_string(),
            dest: UNGROUPED_ZONE.to_string(),
        })
        .await
        .expect("move out");

        let view = core.view(FilterParams::default()).await;
        assert_eq!(view.ungrouped.ads.len(), 1);
        assert!(view.groups[0].ads.is_empty());
    }

    #[tokio::test]
    async fn list_ads_slices_like_the_original_api() {
        let (core, _) = seeded_core(vec![
            ad("A", "L1", "1"),
            ad("A", "L2", "1"),
            ad("A", "L3", "1"),
        ])
        .await;
        let page = core.list_ads(1, 1).await;
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].library_id, "L2");
        assert!(core.list_ads(10, 5).await.is_empty());
    }
}
