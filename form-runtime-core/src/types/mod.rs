//! 类型定义模块

mod block;
mod context;
mod criteria;
mod definition;
mod notice;
mod question;
mod record;

pub use block::{Block, DirtyCounts, Paging};
pub use context::{
    FieldEdit, FormEvent, FormInfo, HookContext, LovEvent, LovOutcome, RecordOperation,
    ScreenMode,
};
pub use criteria::{Criterion, PageRequest, QueryCriteria, QueryRequest};
pub use definition::{
    BlockDefinition, FormDefinition, FormSettings, ItemDefinition, ItemLovDefinition, JoinPair,
    LovDefinition, LovMapping, RelationDefinition,
};
pub use notice::Notice;
pub use question::{Answer, PendingOperation, Question, QuestionId};
pub use record::{FieldValues, Record, RecordId};
