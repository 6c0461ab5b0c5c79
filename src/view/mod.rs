//! View state for one table screen.
//!
//! All state that drives rendering lives in [`TableView`]; handlers take it by
//! `&mut` and overwrite it wholesale when a list response is accepted. List
//! loads are tagged with a [`RequestToken`] so a response that arrives after a
//! newer load was started is dropped instead of clobbering the newer render.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::fetcher::{CrudClient, CrudError};
use crate::form::Form;
use crate::model::{ListResponse, RelatedOptionSets, Row};
use crate::pagination::{PageRequest, PageSizeStore, PaginationTracker};
use crate::render::{self, escape_html, DateStyle};
use crate::schema::{SchemaRegistry, TableSchema};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ViewPhase {
    Idle,
    Loading,
    Displayed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoticeKind {
    /// Blocking prompt, used for failed writes.
    Alert,
    /// Transient banner, used for failed loads.
    Banner,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct RequestToken(u64);

pub struct TableView {
    registry: Arc<SchemaRegistry>,
    store: Arc<dyn PageSizeStore>,
    style: DateStyle,
    schema: TableSchema,
    rows: Vec<Row>,
    fields: Vec<String>,
    options: RelatedOptionSets,
    pagination: PaginationTracker,
    phase: ViewPhase,
    issued: u64,
    notice: Option<Notice>,
    load_error: Option<String>,
}

impl TableView {
    pub fn new(
        table: &str,
        registry: Arc<SchemaRegistry>,
        store: Arc<dyn PageSizeStore>,
        style: DateStyle,
    ) -> Result<Self, CrudError> {
        let pagination = PaginationTracker::new(table, store.clone())?;
        Ok(Self {
            schema: registry.schema_for(table),
            registry,
            store,
            style,
            rows: Vec::new(),
            fields: Vec::new(),
            options: RelatedOptionSets::default(),
            pagination,
            phase: ViewPhase::Idle,
            issued: 0,
            notice: None,
            load_error: None,
        })
    }

    pub fn table(&self) -> &str {
        &self.schema.table
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn options(&self) -> &RelatedOptionSets {
        &self.options
    }

    pub fn pagination(&self) -> &PaginationTracker {
        &self.pagination
    }

    pub fn phase(&self) -> ViewPhase {
        self.phase
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    pub fn take_notice(&mut self) -> Option<Notice> {
        self.notice.take()
    }

    /// Field order for rendering: the listed rows' keys, or the schema's
    /// declared fields while the table is empty.
    pub fn fields(&self) -> Vec<String> {
        if !self.fields.is_empty() {
            return self.fields.clone();
        }
        let mut fields = vec!["id".to_string()];
        fields.extend(self.schema.fields.iter().map(|f| f.name.clone()));
        fields
    }

    /// Marks a list load as started and returns its token.
    pub fn begin_load(&mut self) -> RequestToken {
        self.issued += 1;
        self.phase = ViewPhase::Loading;
        RequestToken(self.issued)
    }

    pub fn is_current(&self, token: RequestToken) -> bool {
        token.0 == self.issued
    }

    /// Applies the outcome of the load started with `token`. Returns `false`
    /// when the token is stale and the outcome was discarded.
    pub fn complete_load(
        &mut self,
        token: RequestToken,
        outcome: Result<ListResponse, CrudError>,
    ) -> bool {
        if !self.is_current(token) {
            debug!(table = %self.table(), token = token.0, latest = self.issued, "discarding stale list response");
            return false;
        }
        match outcome {
            Ok(resp) => self.accept_page(resp),
            Err(err) => self.record_load_failure(&err),
        }
        self.phase = ViewPhase::Displayed;
        true
    }

    fn accept_page(&mut self, resp: ListResponse) {
        self.fields = render::list_fields(&resp.data);
        self.pagination.apply(resp.pagination.as_ref());
        let options = resp.related_options();
        if !options.is_empty() {
            self.options = options;
        }
        self.rows = resp.data;
        self.load_error = None;
        info!(
            table = %self.table(),
            rows = self.rows.len(),
            page = self.pagination.state().page,
            total_items = self.pagination.state().total_items,
            "table loaded"
        );
    }

    fn record_load_failure(&mut self, err: &CrudError) {
        warn!(table = %self.table(), error = %err, "table load failed");
        let message = err.user_message();
        if self.rows.is_empty() {
            self.load_error = Some(message.clone());
        }
        self.notice = Some(Notice {
            kind: NoticeKind::Banner,
            message,
        });
    }

    async fn load(&mut self, client: &CrudClient, req: PageRequest) -> Result<(), CrudError> {
        let table = self.table().to_string();
        let token = self.begin_load();
        match client.list(&table, req.page, req.page_size).await {
            Ok(resp) => {
                self.complete_load(token, Ok(resp));
                Ok(())
            }
            Err(err) => {
                if self.is_current(token) {
                    self.record_load_failure(&err);
                    self.phase = ViewPhase::Displayed;
                }
                Err(err)
            }
        }
    }

    /// Reloads the current page.
    pub async fn refresh(&mut self, client: &CrudClient) -> Result<(), CrudError> {
        let req = self.pagination.current();
        self.load(client, req).await
    }

    /// Switches to `table`, restoring its stored page size, and loads page 1.
    pub async fn select_table(&mut self, client: &CrudClient, table: &str) -> Result<(), CrudError> {
        if table != self.table() {
            self.schema = self.registry.schema_for(table);
            self.pagination = PaginationTracker::new(table, self.store.clone())?;
            self.rows.clear();
            self.fields.clear();
            self.options = RelatedOptionSets::default();
            self.load_error = None;
        }
        let req = PageRequest {
            page: 1,
            page_size: self.pagination.state().page_size,
        };
        self.load(client, req).await
    }

    /// Navigates to page `n`; out-of-range pages do nothing and return `Ok(false)`.
    pub async fn change_page(&mut self, client: &CrudClient, n: i64) -> Result<bool, CrudError> {
        let Some(req) = self.pagination.set_page(n) else {
            return Ok(false);
        };
        self.load(client, req).await?;
        Ok(true)
    }

    pub async fn change_page_size(&mut self, client: &CrudClient, n: i64) -> Result<(), CrudError> {
        let req = self.pagination.set_page_size(n)?;
        self.load(client, req).await
    }

    /// Form for creating (`id = None`) or editing a listed row.
    pub fn form(&self, id: Option<i64>) -> Form {
        let row = id.and_then(|id| self.rows.iter().find(|r| r.id() == Some(id)));
        let mut form = Form::for_table(&self.schema, row, &self.fields());
        if row.is_none() {
            form.id = id;
        }
        form
    }

    fn has_relations(&self) -> bool {
        !self.schema.plain_forms
            && self
                .schema
                .fields
                .iter()
                .any(|f| f.kind.relation_target().is_some())
    }

    /// Renders the create/edit form, refreshing relation option lists first
    /// for tables that have relation fields.
    pub async fn open_form(&mut self, client: &CrudClient, id: Option<i64>) -> Result<String, CrudError> {
        if self.has_relations() {
            let table = self.table().to_string();
            let resp = client.list(&table, 1, self.pagination.state().page_size).await?;
            let options = resp.related_options();
            if !options.is_empty() {
                self.options = options;
            }
            if self.fields.is_empty() {
                self.fields = render::list_fields(&resp.data);
            }
        }
        let row = id.and_then(|id| self.rows.iter().find(|r| r.id() == Some(id)));
        Ok(render::render_form(&self.schema, row, &self.fields(), &self.options))
    }

    /// Creates or updates via `form`, then reloads the current page.
    pub async fn submit(&mut self, client: &CrudClient, form: &Form) -> Result<Row, CrudError> {
        match form.submit(client).await {
            Ok(row) => {
                info!(table = %self.table(), id = ?row.id(), "entry saved");
                self.refresh_after_write(client).await;
                Ok(row)
            }
            Err(err) => {
                self.alert(&err);
                Err(err)
            }
        }
    }

    pub async fn delete(&mut self, client: &CrudClient, id: i64) -> Result<(), CrudError> {
        let table = self.table().to_string();
        match client.delete(&table, id).await {
            Ok(()) => {
                info!(table = %self.table(), id, "entry deleted");
                self.refresh_after_write(client).await;
                Ok(())
            }
            Err(err) => {
                self.alert(&err);
                Err(err)
            }
        }
    }

    /// The write already went through, so a failed reload only leaves the
    /// banner notice behind.
    async fn refresh_after_write(&mut self, client: &CrudClient) {
        if let Err(err) = self.refresh(client).await {
            debug!(table = %self.table(), error = %err, "reload after write failed");
        }
    }

    fn alert(&mut self, err: &CrudError) {
        warn!(table = %self.table(), error = %err, "write failed");
        self.notice = Some(Notice {
            kind: NoticeKind::Alert,
            message: err.user_message(),
        });
    }

    /// Listing markup (or the error panel), pagination controls and any notice.
    pub fn render(&self) -> String {
        let mut html = String::new();
        if let Some(notice) = self.notice.as_ref() {
            let class = match notice.kind {
                NoticeKind::Alert => "notice notice-alert",
                NoticeKind::Banner => "notice notice-banner",
            };
            html.push_str(&format!(
                r#"<div class="{class}">Error: {}</div>"#,
                escape_html(&notice.message)
            ));
        }
        if let Some(message) = self.load_error.as_deref() {
            html.push_str(&render::render_error(self.table(), message));
            return html;
        }
        html.push_str(&render::render_list(
            &self.schema,
            &self.rows,
            &self.fields,
            &self.style,
        ));
        html.push_str(&self.pagination.render());
        html
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pagination::MemoryStore;
    use crate::schema::default_registry;
    use serde_json::json;

    fn view(table: &str) -> TableView {
        TableView::new(
            table,
            Arc::new(default_registry()),
            Arc::new(MemoryStore::new()),
            DateStyle::default(),
        )
        .unwrap()
    }

    fn page(ids: &[i64]) -> ListResponse {
        let data: Vec<_> = ids.iter().map(|id| json!({"id": id, "char_field": format!("row{id}")})).collect();
        serde_json::from_value(json!({
            "data": data,
            "pagination": {"enabled": true, "page": 1, "page_size": 5, "total_items": 12,
                           "total_pages": 3, "has_next": true, "has_previous": false}
        }))
        .unwrap()
    }

    #[test]
    fn stale_response_is_discarded() {
        let mut v = view("table1");
        assert_eq!(v.phase(), ViewPhase::Idle);
        let first = v.begin_load();
        let second = v.begin_load();
        assert!(v.complete_load(second, Ok(page(&[10, 11]))));
        assert!(!v.complete_load(first, Ok(page(&[1, 2]))));
        assert_eq!(v.rows().iter().map(|r| r.id().unwrap()).collect::<Vec<_>>(), vec![10, 11]);
        assert_eq!(v.phase(), ViewPhase::Displayed);
    }

    #[test]
    fn failed_load_keeps_previous_rows() {
        let mut v = view("table1");
        let t = v.begin_load();
        v.complete_load(t, Ok(page(&[1])));
        let t = v.begin_load();
        assert_eq!(v.phase(), ViewPhase::Loading);
        v.complete_load(
            t,
            Err(CrudError::Server {
                status: 500,
                message: "boom".to_string(),
            }),
        );
        assert_eq!(v.rows().len(), 1);
        let notice = v.notice().unwrap();
        assert_eq!(notice.kind, NoticeKind::Banner);
        let html = v.render();
        assert!(html.contains("Error: boom"));
        assert!(html.contains("row1"));
        assert!(html.contains("Page 1 of 3"));
    }

    #[test]
    fn first_failed_load_shows_error_panel() {
        let mut v = view("table2");
        let t = v.begin_load();
        v.complete_load(
            t,
            Err(CrudError::Api {
                status: 403,
                message: "forbidden".to_string(),
            }),
        );
        assert!(v.render().contains("Error loading Table 2"));
    }

    #[test]
    fn empty_table_form_uses_declared_fields() {
        let v = view("table3");
        let form = v.form(None);
        let names: Vec<_> = form.controls.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["crudTable", "crudId", "duration_field", "email_field"]);
    }
}
