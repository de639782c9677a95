//! Coroutine 单元测试
//!
//! 测试 resume/suspend 握手、生命周期状态和错误路径
