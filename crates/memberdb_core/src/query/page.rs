//! Paging and sorting request/response types.
//!
//! # Invariants
//! - Page numbers are 0-based.
//! - Page size is at least 1.
//! - `Page` totals come from a separate count query; `Slice` never counts.

use crate::query::{resolve_property, Property, QueryError, QueryResult};
use serde::{Deserialize, Serialize};

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// One sort key by property name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub property: String,
    pub direction: Direction,
}

/// Ordered list of sort keys. Empty means unsorted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sort {
    orders: Vec<Order>,
}

impl Sort {
    pub fn unsorted() -> Self {
        Self::default()
    }

    /// Sorts by every given property in the same direction.
    pub fn by(direction: Direction, properties: &[&str]) -> Self {
        Self {
            orders: properties
                .iter()
                .map(|property| Order {
                    property: (*property).to_string(),
                    direction,
                })
                .collect(),
        }
    }

    /// Appends the keys of `other` after this sort's keys.
    pub fn and(mut self, other: Sort) -> Self {
        self.orders.extend(other.orders);
        self
    }

    pub fn orders(&self) -> &[Order] {
        &self.orders
    }

    pub fn is_sorted(&self) -> bool {
        !self.orders.is_empty()
    }

    /// Maps sort keys to columns, rejecting names outside `properties`.
    pub fn resolve(
        &self,
        properties: &'static [Property],
    ) -> QueryResult<Vec<(&'static str, Direction)>> {
        self.orders
            .iter()
            .map(|order| {
                resolve_property(properties, &order.property)
                    .map(|property| (property.column, order.direction))
            })
            .collect()
    }
}

/// Requested page: 0-based index, size and sort.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    page: u32,
    size: u32,
    sort: Sort,
}

impl PageRequest {
    pub fn of(page: u32, size: u32) -> QueryResult<Self> {
        Self::of_sorted(page, size, Sort::unsorted())
    }

    pub fn of_sorted(page: u32, size: u32, sort: Sort) -> QueryResult<Self> {
        if size == 0 {
            return Err(QueryError::InvalidPageSize(size));
        }
        Ok(Self { page, size, sort })
    }

    pub fn page_number(&self) -> u32 {
        self.page
    }

    pub fn page_size(&self) -> u32 {
        self.size
    }

    pub fn sort(&self) -> &Sort {
        &self.sort
    }

    /// Rows skipped before this page.
    pub fn offset(&self) -> u64 {
        u64::from(self.page) * u64::from(self.size)
    }

    /// Request for the following page; stays on the last representable page.
    pub fn next(&self) -> Self {
        Self {
            page: self.page.saturating_add(1),
            ..self.clone()
        }
    }

    pub fn first(&self) -> Self {
        Self {
            page: 0,
            ..self.clone()
        }
    }
}

/// One page of results plus the total row count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    content: Vec<T>,
    number: u32,
    size: u32,
    total_elements: u64,
}

impl<T> Page<T> {
    pub fn new(content: Vec<T>, request: &PageRequest, total_elements: u64) -> Self {
        Self {
            content,
            number: request.page_number(),
            size: request.page_size(),
            total_elements,
        }
    }

    pub fn content(&self) -> &[T] {
        &self.content
    }

    pub fn into_content(self) -> Vec<T> {
        self.content
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn number_of_elements(&self) -> usize {
        self.content.len()
    }

    pub fn total_elements(&self) -> u64 {
        self.total_elements
    }

    pub fn total_pages(&self) -> u32 {
        u32::try_from(self.page_count()).unwrap_or(u32::MAX)
    }

    fn page_count(&self) -> u64 {
        self.total_elements.div_ceil(u64::from(self.size.max(1)))
    }

    pub fn is_first(&self) -> bool {
        self.number == 0
    }

    pub fn is_last(&self) -> bool {
        !self.has_next()
    }

    pub fn has_next(&self) -> bool {
        u64::from(self.number) + 1 < self.page_count()
    }

    pub fn has_previous(&self) -> bool {
        self.number > 0
    }

    /// Converts the content while keeping paging metadata.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            content: self.content.into_iter().map(f).collect(),
            number: self.number,
            size: self.size,
            total_elements: self.total_elements,
        }
    }
}

/// A page without a total count; `has_next` comes from a look-ahead row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Slice<T> {
    content: Vec<T>,
    number: u32,
    size: u32,
    has_next: bool,
}

impl<T> Slice<T> {
    /// Builds a slice from up to `size + 1` fetched rows.
    pub fn from_lookahead(mut rows: Vec<T>, request: &PageRequest) -> Self {
        let size = request.page_size() as usize;
        let has_next = rows.len() > size;
        rows.truncate(size);
        Self {
            content: rows,
            number: request.page_number(),
            size: request.page_size(),
            has_next,
        }
    }

    pub fn content(&self) -> &[T] {
        &self.content
    }

    pub fn into_content(self) -> Vec<T> {
        self.content
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn has_next(&self) -> bool {
        self.has_next
    }

    pub fn is_first(&self) -> bool {
        self.number == 0
    }

    pub fn is_last(&self) -> bool {
        !self.has_next
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Slice<U> {
        Slice {
            content: self.content.into_iter().map(f).collect(),
            number: self.number,
            size: self.size,
            has_next: self.has_next,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Direction, Page, PageRequest, Slice, Sort};
    use crate::query::{Property, QueryError};

    const PROPERTIES: &[Property] = &[Property {
        name: "username",
        column: "m.username",
    }];

    #[test]
    fn page_metadata_for_first_of_two_pages() {
        let request = PageRequest::of(0, 3).unwrap();
        let page = Page::new(vec![1, 2, 3], &request, 5);

        assert_eq!(page.number_of_elements(), 3);
        assert_eq!(page.total_pages(), 2);
        assert!(page.is_first());
        assert!(page.has_next());
        assert!(!page.has_previous());
    }

    #[test]
    fn last_page_has_no_next() {
        let request = PageRequest::of(1, 3).unwrap();
        let page = Page::new(vec![4, 5], &request, 5);

        assert!(page.is_last());
        assert!(page.has_previous());
        assert_eq!(request.offset(), 3);
    }

    #[test]
    fn empty_result_has_zero_pages() {
        let request = PageRequest::of(0, 10).unwrap();
        let page: Page<u8> = Page::new(Vec::new(), &request, 0);
        assert_eq!(page.total_pages(), 0);
        assert!(page.is_first());
        assert!(!page.has_next());
    }

    #[test]
    fn map_keeps_metadata() {
        let request = PageRequest::of(0, 2).unwrap();
        let page = Page::new(vec![1, 2], &request, 7).map(|value| value * 10);
        assert_eq!(page.content(), &[10, 20]);
        assert_eq!(page.total_elements(), 7);
        assert_eq!(page.total_pages(), 4);
    }

    #[test]
    fn last_representable_page_does_not_overflow() {
        let request = PageRequest::of(u32::MAX, 1).unwrap();
        assert_eq!(request.next().page_number(), u32::MAX);

        let page: Page<u8> = Page::new(Vec::new(), &request, 10);
        assert!(!page.has_next());
        assert!(page.is_last());
        assert!(page.has_previous());

        let beyond = Page::new(vec![1u8], &request, u64::from(u32::MAX) + 5);
        assert!(beyond.has_next());
        assert_eq!(beyond.total_pages(), u32::MAX);
    }

    #[test]
    fn zero_page_size_is_rejected() {
        assert_eq!(
            PageRequest::of(0, 0).unwrap_err(),
            QueryError::InvalidPageSize(0)
        );
    }

    #[test]
    fn slice_uses_lookahead_row() {
        let request = PageRequest::of(0, 3).unwrap();
        let slice = Slice::from_lookahead(vec![1, 2, 3, 4], &request);
        assert_eq!(slice.content(), &[1, 2, 3]);
        assert!(slice.has_next());

        let tail = Slice::from_lookahead(vec![4, 5], &request.next());
        assert!(tail.is_last());
        assert_eq!(tail.number(), 1);
    }

    #[test]
    fn sort_resolves_known_properties_only() {
        let sort = Sort::by(Direction::Desc, &["username"]);
        assert_eq!(
            sort.resolve(PROPERTIES).unwrap(),
            vec![("m.username", Direction::Desc)]
        );

        let unknown = Sort::by(Direction::Asc, &["password"]);
        assert_eq!(
            unknown.resolve(PROPERTIES).unwrap_err(),
            QueryError::UnknownProperty("password".to_string())
        );
    }
}
