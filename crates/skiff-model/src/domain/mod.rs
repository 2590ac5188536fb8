mod id;
pub use id::{TaskId, VolumeId};

mod labels;
pub use labels::{
    ANNOTATION_CREATED_AT, ANNOTATION_NUM_NODES, LABEL_NODE_IDX, LABEL_TASK_ID, LABEL_TASK_NAME,
    LABEL_USERNAME, LABEL_VOLUME_ID, LABEL_VOLUME_NAME, Selector, TASK_KIND_LABEL,
    VOLUME_KIND_LABEL,
};

mod task;
pub use task::{ResourceSpec, TaskDefinition};

mod status;
pub use status::{TaskNodes, TaskState, TaskStatus};

mod volume;
pub use volume::{VolumeDefinition, VolumeStatus};
