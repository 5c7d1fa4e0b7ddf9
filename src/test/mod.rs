mod judging_workload;
