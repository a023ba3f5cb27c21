use serde::Serialize;

pub const ITEMS_PER_PAGE : u32 = 10;

#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub items :        Vec<T>,
    pub number :       u32,
    pub num_pages :    u32,
    pub has_previous : bool,
    pub has_next :     bool,
    pub previous :     u32,
    pub next :         u32,
}

#[derive(Debug, Clone, Copy)]
pub struct Paginator {
    count :    u32,
    per_page : u32,
}

impl Paginator {
    pub fn new(count : u32, per_page : u32) -> Self {
        Self {
            count,
            per_page : per_page.max(1),
        }
    }

    /// An empty listing still has one (empty) page.
    pub fn num_pages(&self) -> u32 {
        ((self.count + self.per_page - 1) / self.per_page).max(1)
    }

    /// Anything that is not a number lands on the first page, a number out
    /// of range on the last.
    pub fn resolve(&self, raw : Option<&str>) -> u32 {
        match raw.map(|s| s.trim().parse::<i64>()) {
            Some(Ok(n)) if n >= 1 && n <= i64::from(self.num_pages()) => {
                n as u32
            },
            Some(Ok(_)) => self.num_pages(),
            _ => 1,
        }
    }

    pub fn per_page(&self) -> u32 {
        self.per_page
    }

    pub fn offset(&self, number : u32) -> u32 {
        (number.max(1) - 1) * self.per_page
    }

    pub fn page<T>(&self, number : u32, items : Vec<T>) -> Page<T> {
        let num_pages = self.num_pages();

        Page {
            items,
            number,
            num_pages,
            has_previous : number > 1,
            has_next : number < num_pages,
            previous : number.saturating_sub(1).max(1),
            next : (number + 1).min(num_pages),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_count() {
        assert_eq!(Paginator::new(0, 10).num_pages(), 1);
        assert_eq!(Paginator::new(10, 10).num_pages(), 1);
        assert_eq!(Paginator::new(11, 10).num_pages(), 2);
        assert_eq!(Paginator::new(35, 10).num_pages(), 4);
    }

    #[test]
    fn resolve_clamps() {
        let p = Paginator::new(35, 10);

        assert_eq!(p.resolve(None), 1);
        assert_eq!(p.resolve(Some("abc")), 1);
        assert_eq!(p.resolve(Some("2")), 2);
        assert_eq!(p.resolve(Some("9999")), 4);
        assert_eq!(p.resolve(Some("0")), 4);
        assert_eq!(p.resolve(Some("-3")), 4);
    }

    #[test]
    fn page_links() {
        let p = Paginator::new(35, 10);

        let first = p.page(1, vec![()]);
        assert!(!first.has_previous);
        assert!(first.has_next);
        assert_eq!(first.next, 2);

        let last = p.page(4, vec![()]);
        assert!(last.has_previous);
        assert!(!last.has_next);
        assert_eq!(last.previous, 3);
        assert_eq!(p.offset(4), 30);
    }
}
