// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 连接生命周期状态
//!
//! `Active` → `Finishing`（响应已生成完毕，只剩缓冲区待发送）→ `Dead`（终止态）。
//! 任何致命的 I/O 错误或缓冲区溢出都会让连接从 `Active`/`Finishing` 直接进入 `Dead`。
//! 状态值由每个连接自己持有，并显式传入每一个缓冲区操作。

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    #[default]
    Active,
    Finishing,
    Dead,
}

impl ConnectionStatus {
    /// 响应已经完整写入缓冲区，进入排空阶段。已经死亡的连接保持死亡。
    pub fn finish(&mut self) {
        if *self == ConnectionStatus::Active {
            *self = ConnectionStatus::Finishing;
        }
    }

    pub fn kill(&mut self) {
        *self = ConnectionStatus::Dead;
    }

    pub fn is_dead(&self) -> bool {
        *self == ConnectionStatus::Dead
    }

    /// 状态本身是否还允许写入。`Finishing` 阶段只有在缓冲区尚未排空时才能追加数据，
    /// 这一点由 [`OutputBuffer`](crate::buffer::OutputBuffer) 结合自身窗口判断。
    pub fn accepts_writes(&self) -> bool {
        !self.is_dead()
    }
}
