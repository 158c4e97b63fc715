mod entities;
mod entity_list;
mod product_detail;
mod showcase;

pub use entity_list::ListView;
use product_detail::ProductDetailView;
pub use showcase::ShowcaseView;
