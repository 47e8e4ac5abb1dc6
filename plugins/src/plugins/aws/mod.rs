//! AWS check plugins

pub mod elb_summary;
pub mod limits;
pub mod regions;

pub use elb_summary::AwsElbSummary;
pub use limits::{
    AwsLimitsPlugin, AWS_EBS_LIMITS, AWS_EC2_LIMITS, AWS_ELB_LIMITS, AWS_GLACIER_LIMITS,
    AWS_S3_LIMITS,
};
