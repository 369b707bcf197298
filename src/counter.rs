// 该文件是 Yumi （玉米计数） 项目的一部分。
// src/counter.rs - 累计计数器
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use std::sync::atomic::{AtomicU64, Ordering};

use tracing::info;

/// 进程级累计计数器，所有请求共享
#[derive(Debug, Default)]
pub struct SessionCounter {
  total: AtomicU64,
}

impl SessionCounter {
  pub fn new() -> Self {
    Self::default()
  }

  /// 累加本次检测的数量，返回累加后的总数
  pub fn increment(&self, n: u64) -> u64 {
    let total = self.total.fetch_add(n, Ordering::AcqRel) + n;
    info!("累计计数 +{} => {}", n, total);
    total
  }

  pub fn reset(&self) {
    let previous = self.total.swap(0, Ordering::AcqRel);
    info!("累计计数已清零 (之前为 {})", previous);
  }

  pub fn get(&self) -> u64 {
    self.total.load(Ordering::Acquire)
  }
}
